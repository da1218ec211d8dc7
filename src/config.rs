use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::actions::sonos::SONOS_PORT;
use crate::ports;

/// Timeouts and limits for discovery, the registry and the dispatchers.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Ports probed on each candidate host.
    pub ports: Vec<u16>,
    /// Per-port connect timeout for standalone scans.
    pub port_timeout: Duration,
    /// Per-port connect timeout inside a full discovery pass.
    pub discovery_port_timeout: Duration,
    pub ping_timeout: Duration,
    pub quick_scan_timeout: Duration,
    /// How long the mDNS socket listens during discovery.
    pub mdns_window: Duration,
    pub arp_timeout: Duration,
    pub print_timeout: Duration,
    pub http_timeout: Duration,
    pub wol_target: SocketAddrV4,
    /// UPnP control port on Sonos speakers.
    pub sonos_port: u16,
    /// Entries not refreshed within this long are evicted.
    pub registry_ttl: Duration,
    pub registry_capacity: usize,
    /// Max concurrent pings during a subnet sweep.
    pub sweep_concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ports: ports::default_ports(),
            port_timeout: Duration::from_millis(500),
            discovery_port_timeout: Duration::from_millis(300),
            ping_timeout: Duration::from_millis(1000),
            quick_scan_timeout: Duration::from_millis(500),
            mdns_window: Duration::from_millis(3000),
            arp_timeout: Duration::from_secs(10),
            print_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(5),
            wol_target: SocketAddrV4::new(Ipv4Addr::BROADCAST, 9),
            sonos_port: SONOS_PORT,
            registry_ttl: Duration::from_secs(24 * 60 * 60),
            registry_capacity: 1024,
            sweep_concurrency: 64,
        }
    }
}
