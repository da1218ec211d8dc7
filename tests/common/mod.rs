#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lan_devctl::netdetect::calculate_subnet;
use lan_devctl::types::{ArpEntry, MdnsResponse, NetworkInterface, PingResult};
use lan_devctl::{Discovery, DiscoveryConfig, NetworkProbe};

/// Scripted network: fixed interfaces, ARP table, mDNS replies, open ports
/// and ping responders.
#[derive(Default)]
pub struct FakeProbe {
    pub interfaces: Vec<NetworkInterface>,
    pub arp: Vec<ArpEntry>,
    pub mdns: Vec<MdnsResponse>,
    pub open_ports: HashMap<IpAddr, Vec<u16>>,
    pub alive: HashSet<IpAddr>,
    /// Delay inside the ARP dump, to hold a discovery open.
    pub arp_delay: Duration,
    pub arp_calls: AtomicUsize,
    pub scan_calls: AtomicUsize,
}

impl FakeProbe {
    pub fn on_lan() -> Self {
        Self {
            interfaces: vec![lan_interface()],
            ..Default::default()
        }
    }

    pub fn with_arp_table(mut self, table: &str) -> Self {
        self.arp = lan_devctl::arp::parse_arp_table(table);
        self
    }

    pub fn with_ports(mut self, ip: &str, ports: &[u16]) -> Self {
        self.open_ports.insert(ip.parse().unwrap(), ports.to_vec());
        self
    }

    pub fn with_alive(mut self, ip: &str) -> Self {
        self.alive.insert(ip.parse().unwrap());
        self
    }

    pub fn arp_calls(&self) -> usize {
        self.arp_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkProbe for FakeProbe {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        self.interfaces.clone()
    }

    async fn arp_table(&self, _timeout: Duration) -> Vec<ArpEntry> {
        self.arp_calls.fetch_add(1, Ordering::SeqCst);
        if !self.arp_delay.is_zero() {
            tokio::time::sleep(self.arp_delay).await;
        }
        self.arp.clone()
    }

    async fn mdns(&self, _window: Duration) -> Vec<MdnsResponse> {
        self.mdns.clone()
    }

    async fn ping(&self, ip: IpAddr, _timeout: Duration) -> PingResult {
        if self.alive.contains(&ip) {
            PingResult {
                alive: true,
                latency: Some(2),
            }
        } else {
            PingResult::default()
        }
    }

    async fn scan_ports(&self, ip: IpAddr, ports: &[u16], _timeout: Duration) -> Vec<u16> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.open_ports
            .get(&ip)
            .map(|open| open.iter().copied().filter(|p| ports.contains(p)).collect())
            .unwrap_or_default()
    }
}

pub fn lan_interface() -> NetworkInterface {
    let address = Ipv4Addr::new(192, 168, 1, 5);
    let netmask = Ipv4Addr::new(255, 255, 255, 0);
    NetworkInterface {
        interface_name: "eth0".to_string(),
        address,
        netmask,
        subnet: calculate_subnet(address, netmask),
        mac: Some("B8:27:EB:00:00:05".to_string()),
    }
}

pub fn discovery_with(probe: Arc<FakeProbe>) -> Arc<Discovery> {
    discovery_with_config(probe, DiscoveryConfig::default())
}

pub fn discovery_with_config(probe: Arc<FakeProbe>, config: DiscoveryConfig) -> Arc<Discovery> {
    Arc::new(Discovery::with_probe(probe, config))
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}
