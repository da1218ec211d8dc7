use if_addrs::{get_if_addrs, IfAddr};
use ipnet::{IpNet, Ipv4Net};
use std::net::{IpAddr, Ipv4Addr};
use tracing::warn;

use crate::types::NetworkInterface;

/// Enumerate local non-loopback IPv4 interfaces with their /24 subnet.
///
/// Never fails: if the OS query errors, the failure is logged and the list
/// is empty.
pub fn get_network_info() -> Vec<NetworkInterface> {
    let ifaces = match get_if_addrs() {
        Ok(v) => v,
        Err(e) => {
            warn!("failed to enumerate network interfaces: {e}");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for iface in ifaces {
        if iface.is_loopback() {
            continue;
        }
        if let IfAddr::V4(v4) = &iface.addr {
            out.push(NetworkInterface {
                mac: read_interface_mac(&iface.name),
                interface_name: iface.name.clone(),
                address: v4.ip,
                netmask: v4.netmask,
                subnet: calculate_subnet(v4.ip, v4.netmask),
            });
        }
    }
    out
}

/// AND the address with its netmask octet by octet and express the result as a /24.
///
/// `192.168.1.42` / `255.255.255.0` becomes `192.168.1.0/24`. The prefix is
/// always 24 regardless of the mask width; scans never target more than one /24.
pub fn calculate_subnet(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    let m = netmask.octets();
    let net = Ipv4Addr::new(o[0] & m[0], o[1] & m[1], o[2] & m[2], o[3] & m[3]);
    Ipv4Net::new(net, 24).unwrap_or_else(|_| Ipv4Net::from(net))
}

/// Expand a CIDR into the host addresses a subnet sweep should probe.
///
/// For IPv4, excludes the network and broadcast addresses. IPv6 is not swept.
pub fn expand_cidr_to_ips(cidr: IpNet) -> Vec<IpAddr> {
    match cidr {
        IpNet::V4(n4) => expand_ipv4net_hosts(n4.trunc())
            .into_iter()
            .map(IpAddr::V4)
            .collect(),
        IpNet::V6(_) => Vec::new(),
    }
}

fn expand_ipv4net_hosts(net: Ipv4Net) -> Vec<Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if end.saturating_sub(start) <= 1 {
        return Vec::new();
    }
    (start + 1..end).map(Ipv4Addr::from).collect()
}

#[cfg(target_os = "linux")]
fn read_interface_mac(name: &str) -> Option<String> {
    let raw = std::fs::read_to_string(format!("/sys/class/net/{name}/address")).ok()?;
    crate::vendor::normalize_mac(raw.trim()).filter(|m| *m != "00:00:00:00:00:00")
}

#[cfg(not(target_os = "linux"))]
fn read_interface_mac(_name: &str) -> Option<String> {
    None
}
