//! Heuristic device classification.
//!
//! Each archetype has a profile of expected TCP ports and manufacturer
//! substrings. A matching open port adds [`PORT_WEIGHT`], a manufacturer
//! substring found in the vendor or hostname adds [`VENDOR_WEIGHT`]. The
//! strictly highest total wins; ties go to the profile listed first in
//! [`PROFILES`]. An all-zero score is [`DeviceType::Unknown`].

use std::collections::BTreeSet;

use crate::types::{Capability, DeviceType};

pub const PORT_WEIGHT: u32 = 10;
pub const VENDOR_WEIGHT: u32 = 20;

/// Expected ports and manufacturer substrings (lower-case) for one archetype.
#[derive(Debug)]
pub struct TypeProfile {
    pub device_type: DeviceType,
    pub ports: &'static [u16],
    pub manufacturers: &'static [&'static str],
}

/// Scoring table. Order matters: it is the tie-break order.
pub const PROFILES: &[TypeProfile] = &[
    TypeProfile {
        device_type: DeviceType::Printer,
        ports: &[9100, 515, 631],
        manufacturers: &["hp", "canon", "epson", "brother", "xerox", "lexmark", "samsung", "ricoh"],
    },
    TypeProfile {
        device_type: DeviceType::Speaker,
        ports: &[8008, 8443, 1400, 3689],
        manufacturers: &["sonos", "google", "apple", "bose", "jbl", "harman"],
    },
    TypeProfile {
        device_type: DeviceType::Computer,
        ports: &[22, 3389, 5900, 445, 139, 548],
        manufacturers: &[],
    },
    TypeProfile {
        device_type: DeviceType::SmartTv,
        ports: &[8001, 8002, 9000, 55000],
        manufacturers: &["samsung", "lg", "sony", "vizio", "tcl", "roku"],
    },
    TypeProfile {
        device_type: DeviceType::SmartHome,
        ports: &[80, 443, 8080, 8123],
        manufacturers: &["philips", "hue", "nest", "ring", "ecobee", "wemo", "lifx"],
    },
    TypeProfile {
        device_type: DeviceType::Nas,
        ports: &[5000, 5001, 80, 443, 139, 445],
        manufacturers: &["synology", "qnap", "western digital", "netgear"],
    },
    TypeProfile {
        device_type: DeviceType::Camera,
        ports: &[554, 8554, 80, 443],
        manufacturers: &["nest", "ring", "arlo", "wyze", "eufy", "hikvision"],
    },
    TypeProfile {
        device_type: DeviceType::Router,
        ports: &[80, 443, 8080],
        manufacturers: &["netgear", "asus", "tp-link", "linksys", "ubiquiti", "cisco"],
    },
];

/// Fixed port to capability mapping.
const CAPABILITY_PORTS: &[(Capability, &[u16])] = &[
    (Capability::Ssh, &[22]),
    (Capability::Web, &[80, 443, 8080]),
    (Capability::Rdp, &[3389]),
    (Capability::Vnc, &[5900]),
    (Capability::Smb, &[445, 139]),
    (Capability::Afp, &[548]),
    (Capability::Print, &[9100, 631, 515]),
    (Capability::Rtsp, &[554]),
    (Capability::Cast, &[8008]),
    (Capability::Sonos, &[1400]),
    (Capability::HomeAssistant, &[8123]),
];

/// Per-profile scores, in [`PROFILES`] order.
pub fn score_profiles(
    open_ports: &BTreeSet<u16>,
    vendor: Option<&str>,
    hostname: Option<&str>,
) -> Vec<(DeviceType, u32)> {
    let vendor = vendor.unwrap_or_default().to_lowercase();
    let hostname = hostname.unwrap_or_default().to_lowercase();

    PROFILES
        .iter()
        .map(|profile| {
            let port_hits = profile.ports.iter().filter(|p| open_ports.contains(*p)).count() as u32;
            let vendor_hits = profile
                .manufacturers
                .iter()
                .filter(|m| vendor.contains(*m) || hostname.contains(*m))
                .count() as u32;
            (
                profile.device_type,
                port_hits * PORT_WEIGHT + vendor_hits * VENDOR_WEIGHT,
            )
        })
        .collect()
}

/// Pick the best-scoring archetype for a host.
pub fn identify_device_type(
    open_ports: &BTreeSet<u16>,
    vendor: Option<&str>,
    hostname: Option<&str>,
) -> DeviceType {
    let mut best = DeviceType::Unknown;
    let mut best_score = 0;
    for (device_type, score) in score_profiles(open_ports, vendor, hostname) {
        if score > best_score {
            best_score = score;
            best = device_type;
        }
    }
    best
}

/// Capabilities implied by a set of open ports.
pub fn device_capabilities(open_ports: &BTreeSet<u16>) -> BTreeSet<Capability> {
    CAPABILITY_PORTS
        .iter()
        .filter(|(_, ports)| ports.iter().any(|p| open_ports.contains(p)))
        .map(|(cap, _)| *cap)
        .collect()
}
