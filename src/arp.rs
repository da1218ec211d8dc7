use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::process::Command;
use tokio::time;
use tracing::{debug, warn};

use crate::types::ArpEntry;
use crate::vendor::{lookup_vendor, normalize_mac};

const BROADCAST_MAC: &str = "FF:FF:FF:FF:FF:FF";

/// Dump the OS ARP table with `arp -a` and parse it.
///
/// A missing binary, non-zero exit or timeout is logged and yields an empty
/// list.
pub async fn arp_scan(timeout: Duration) -> Vec<ArpEntry> {
    let output = Command::new("arp").arg("-a").kill_on_drop(true).output();
    let output = match time::timeout(timeout, output).await {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => {
            warn!("ARP scan failed: {e}");
            return Vec::new();
        }
        Err(_) => {
            warn!("ARP scan timed out after {}ms", timeout.as_millis());
            return Vec::new();
        }
    };
    if !output.status.success() {
        warn!(status = %output.status, "arp exited unsuccessfully");
        return Vec::new();
    }

    let entries = parse_arp_table(&String::from_utf8_lossy(&output.stdout));
    debug!(count = entries.len(), "parsed ARP table");
    entries
}

/// Parse `arp -a` output in the BSD/Linux form `hostname (ip) at mac ...`.
///
/// Incomplete entries, unparsable MACs and the broadcast MAC are dropped.
/// A hostname of `?` counts as no hostname.
pub fn parse_arp_table(output: &str) -> Vec<ArpEntry> {
    output.lines().filter_map(parse_arp_line).collect()
}

fn parse_arp_line(line: &str) -> Option<ArpEntry> {
    let (head, rest) = line.split_once('(')?;
    let (ip, rest) = rest.split_once(')')?;
    let ip: Ipv4Addr = ip.trim().parse().ok()?;

    let rest = rest.trim_start().strip_prefix("at")?;
    let raw_mac = rest.split_whitespace().next()?;
    let mac = normalize_mac(raw_mac)?;
    if mac == BROADCAST_MAC {
        return None;
    }

    let hostname = match head.trim() {
        "" | "?" => None,
        h => Some(h.to_string()),
    };

    Some(ArpEntry {
        ip,
        vendor: lookup_vendor(&mac).map(str::to_string),
        mac,
        hostname,
    })
}
