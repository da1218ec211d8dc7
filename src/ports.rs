use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Ports probed when the caller does not supply its own list.
///
/// Each one maps to a classifier profile or a capability: SSH, HTTP(S), SMB,
/// LPD, AFP, RTSP, IPP, Sonos, RDP, Synology/UPnP, mDNS, VNC, Cast,
/// Home Assistant, JetDirect and a few common alternates.
pub const CANONICAL_PORTS: &[u16] = &[
    22, 80, 443, 445, 515, 548, 554, 631, 1400, 3000, 3389, 5000, 5353, 5900, 8000, 8008, 8080,
    8123, 8443, 9000, 9100,
];

/// Parse a port list into a deduplicated list of TCP ports (1..=65535).
///
/// Supported formats:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - several entries on one line separated by commas: `22, 80, 8000-8002`
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");

        for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some((a, b)) = token.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port_str(token)
                .with_context(|| format!("line {line_no}: invalid port value: {token}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// Load a port list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

/// Load a port list from a file, falling back to [`CANONICAL_PORTS`] if it is
/// missing, unreadable or empty.
pub fn load_ports_or_default(path: impl AsRef<Path>) -> Vec<u16> {
    match load_ports_from_path(&path) {
        Ok(v) if !v.is_empty() => v,
        Ok(_) => {
            warn!(path = %path.as_ref().display(), "ports file is empty, using defaults");
            default_ports()
        }
        Err(e) => {
            warn!("{e:#}; using default ports");
            default_ports()
        }
    }
}

pub fn default_ports() -> Vec<u16> {
    CANONICAL_PORTS.to_vec()
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
