use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Instant;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::classify;

/// A local, non-loopback IPv4 interface and the /24 it sits in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(rename = "interface")]
    pub interface_name: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub subnet: Ipv4Net,
    pub mac: Option<String>,
}

/// Device archetypes the classifier can assign.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    #[serde(rename = "printer")]
    Printer,
    #[serde(rename = "speaker")]
    Speaker,
    #[serde(rename = "computer")]
    Computer,
    #[serde(rename = "smartTV")]
    SmartTv,
    #[serde(rename = "smartHome")]
    SmartHome,
    #[serde(rename = "nas")]
    Nas,
    #[serde(rename = "camera")]
    Camera,
    #[serde(rename = "router")]
    Router,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Printer => "printer",
            DeviceType::Speaker => "speaker",
            DeviceType::Computer => "computer",
            DeviceType::SmartTv => "smartTV",
            DeviceType::SmartHome => "smartHome",
            DeviceType::Nas => "nas",
            DeviceType::Camera => "camera",
            DeviceType::Router => "router",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    /// Case-insensitive, so `smarttv` and `smartTV` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = match s.to_ascii_lowercase().as_str() {
            "printer" => DeviceType::Printer,
            "speaker" => DeviceType::Speaker,
            "computer" => DeviceType::Computer,
            "smarttv" => DeviceType::SmartTv,
            "smarthome" => DeviceType::SmartHome,
            "nas" => DeviceType::Nas,
            "camera" => DeviceType::Camera,
            "router" => DeviceType::Router,
            "unknown" => DeviceType::Unknown,
            other => return Err(format!("unknown device type: {other}")),
        };
        Ok(t)
    }
}

/// What a device can be asked to do, derived from its open ports.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Ssh,
    Web,
    Rdp,
    Vnc,
    Smb,
    Afp,
    Print,
    Rtsp,
    Cast,
    Sonos,
    HomeAssistant,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Ssh => "ssh",
            Capability::Web => "web",
            Capability::Rdp => "rdp",
            Capability::Vnc => "vnc",
            Capability::Smb => "smb",
            Capability::Afp => "afp",
            Capability::Print => "print",
            Capability::Rtsp => "rtsp",
            Capability::Cast => "cast",
            Capability::Sonos => "sonos",
            Capability::HomeAssistant => "homeassistant",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = match s.to_ascii_lowercase().as_str() {
            "ssh" => Capability::Ssh,
            "web" => Capability::Web,
            "rdp" => Capability::Rdp,
            "vnc" => Capability::Vnc,
            "smb" => Capability::Smb,
            "afp" => Capability::Afp,
            "print" => Capability::Print,
            "rtsp" => Capability::Rtsp,
            "cast" => Capability::Cast,
            "sonos" => Capability::Sonos,
            "homeassistant" => Capability::HomeAssistant,
            other => return Err(format!("unknown capability: {other}")),
        };
        Ok(c)
    }
}

/// One parsed line of the OS ARP table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: String,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
}

/// A datagram heard on the mDNS group during the listen window.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MdnsResponse {
    pub ip: IpAddr,
    pub port: u16,
    /// Hex of the leading bytes of the payload. Opaque; not decoded.
    pub raw: String,
}

/// Result of a TCP reachability check.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingResult {
    pub alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
}

/// A host seen by ARP, mDNS or the subnet sweep, before its ports are scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCandidate {
    pub ip: IpAddr,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub mdns: bool,
}

impl HostCandidate {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            mac: None,
            hostname: None,
            vendor: None,
            mdns: false,
        }
    }
}

impl From<ArpEntry> for HostCandidate {
    fn from(e: ArpEntry) -> Self {
        Self {
            ip: IpAddr::V4(e.ip),
            mac: Some(e.mac),
            hostname: e.hostname,
            vendor: e.vendor,
            mdns: false,
        }
    }
}

/// A classified device on the LAN.
///
/// `type` and `capabilities` are derived from `openPorts`, `vendor` and
/// `hostname` at construction and are never set on their own, so the type
/// is serialize-only.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    ip: IpAddr,
    mac: Option<String>,
    hostname: Option<String>,
    vendor: Option<String>,
    open_ports: BTreeSet<u16>,
    #[serde(rename = "type")]
    device_type: DeviceType,
    capabilities: BTreeSet<Capability>,
    pub mdns: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    pub discovered_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(skip)]
    refreshed_at: Option<Instant>,
}

impl Device {
    /// Build a device from a scanned candidate, classifying it on the way.
    pub fn from_scan(candidate: HostCandidate, open_ports: impl IntoIterator<Item = u16>) -> Self {
        let open_ports: BTreeSet<u16> = open_ports.into_iter().collect();
        let device_type = classify::identify_device_type(
            &open_ports,
            candidate.vendor.as_deref(),
            candidate.hostname.as_deref(),
        );
        let capabilities = classify::device_capabilities(&open_ports);
        Self {
            ip: candidate.ip,
            mac: candidate.mac,
            hostname: candidate.hostname,
            vendor: candidate.vendor,
            open_ports,
            device_type,
            capabilities,
            mdns: candidate.mdns,
            online: None,
            latency: None,
            discovered_at: now_rfc3339(),
            last_seen: None,
            refreshed_at: Some(Instant::now()),
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn mac(&self) -> Option<&str> {
        self.mac.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn open_ports(&self) -> &BTreeSet<u16> {
        &self.open_ports
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Noise hosts (no open port, no name) are not kept.
    pub fn is_noise(&self) -> bool {
        self.open_ports.is_empty() && self.hostname.is_none()
    }

    /// Record a successful liveness check.
    pub fn mark_alive(&mut self, latency: Option<u64>) {
        self.online = Some(true);
        self.latency = latency;
        self.last_seen = Some(now_rfc3339());
        self.refreshed_at = Some(Instant::now());
    }

    pub fn mark_offline(&mut self) {
        self.online = Some(false);
    }

    /// Fold a newer scan of the same IP into this record, keeping its identity.
    pub(crate) fn refresh_from(&mut self, newer: Device) {
        debug_assert_eq!(self.ip, newer.ip);
        if newer.mac.is_some() {
            self.mac = newer.mac;
        }
        if newer.hostname.is_some() {
            self.hostname = newer.hostname;
        }
        if newer.vendor.is_some() {
            self.vendor = newer.vendor;
        }
        self.open_ports = newer.open_ports;
        self.mdns = newer.mdns;
        self.device_type = classify::identify_device_type(
            &self.open_ports,
            self.vendor.as_deref(),
            self.hostname.as_deref(),
        );
        self.capabilities = classify::device_capabilities(&self.open_ports);
        self.refreshed_at = newer.refreshed_at;
    }

    pub(crate) fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }
}

/// Outcome of a full discovery pass.
#[derive(Serialize, Debug, Clone)]
pub struct DiscoveryReport {
    pub network: NetworkInterface,
    pub devices: Vec<Device>,
    pub count: usize,
    /// Milliseconds.
    pub duration: u64,
}

pub(crate) fn now_rfc3339() -> String {
    use ::time::{format_description::well_known, OffsetDateTime};
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
