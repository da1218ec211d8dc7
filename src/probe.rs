use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::{ArpEntry, MdnsResponse, NetworkInterface, PingResult};
use crate::{arp, mdns, netdetect, scanner};

/// The network-facing primitives discovery is built from.
///
/// [`SystemProbe`] talks to the real OS and LAN; tests substitute a fake to
/// drive discovery deterministically. None of these methods fail: expected
/// failures come back as empty or negative results.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    fn interfaces(&self) -> Vec<NetworkInterface>;

    async fn arp_table(&self, timeout: Duration) -> Vec<ArpEntry>;

    async fn mdns(&self, window: Duration) -> Vec<MdnsResponse>;

    async fn ping(&self, ip: IpAddr, timeout: Duration) -> PingResult;

    async fn scan_ports(&self, ip: IpAddr, ports: &[u16], timeout: Duration) -> Vec<u16>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

#[async_trait]
impl NetworkProbe for SystemProbe {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        netdetect::get_network_info()
    }

    async fn arp_table(&self, timeout: Duration) -> Vec<ArpEntry> {
        arp::arp_scan(timeout).await
    }

    async fn mdns(&self, window: Duration) -> Vec<MdnsResponse> {
        mdns::mdns_discover(window).await
    }

    async fn ping(&self, ip: IpAddr, timeout: Duration) -> PingResult {
        scanner::ping_host(ip, timeout).await
    }

    async fn scan_ports(&self, ip: IpAddr, ports: &[u16], timeout: Duration) -> Vec<u16> {
        scanner::scan_ports(ip, ports, timeout).await
    }
}
