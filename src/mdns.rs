use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::types::MdnsResponse;

pub const MDNS_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;

/// Number of leading payload bytes kept (hex-encoded) in [`MdnsResponse::raw`].
const RAW_PREFIX_BYTES: usize = 50;

/// DNS-SD meta query name.
const SERVICES_QUERY: &str = "_services._dns-sd._udp.local";

/// Build a one-question DNS query asking for PTR records of `name`, class IN.
pub fn build_ptr_query(name: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12 + name.len() + 6);
    // id, flags, qdcount=1, ancount, nscount, arcount
    buf.extend_from_slice(&[0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    // type PTR, class IN
    buf.extend_from_slice(&[0x00, 0x0c, 0x00, 0x01]);
    buf
}

/// The service-enumeration query sent when the listener starts.
pub fn services_query() -> Vec<u8> {
    build_ptr_query(SERVICES_QUERY)
}

/// Send one service-enumeration query and collect the source of every
/// datagram heard on the mDNS group until `window` elapses.
///
/// Replies are not decoded. Bind or send failures are logged and whatever was
/// collected so far (possibly nothing) is returned.
pub async fn mdns_discover(window: Duration) -> Vec<MdnsResponse> {
    let socket = match bind_multicast() {
        Ok(s) => s,
        Err(e) => {
            warn!("mDNS socket setup failed: {e}");
            return Vec::new();
        }
    };

    let target = SocketAddr::V4(SocketAddrV4::new(MDNS_ADDR, MDNS_PORT));
    if let Err(e) = socket.send_to(&services_query(), target).await {
        warn!("mDNS query send failed: {e}");
    }

    let deadline = Instant::now() + window;
    let mut responses = Vec::new();
    let mut buf = [0u8; 9000];
    loop {
        match time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) => responses.push(MdnsResponse {
                ip: from.ip(),
                port: from.port(),
                raw: hex_prefix(&buf[..n]),
            }),
            Ok(Err(e)) => {
                warn!("mDNS receive failed, closing listener early: {e}");
                break;
            }
            Err(_) => break,
        }
    }
    debug!(count = responses.len(), "mDNS listen window closed");
    responses
}

fn bind_multicast() -> io::Result<UdpSocket> {
    let socket = shared_udp_socket(MDNS_PORT)?;
    socket.join_multicast_v4(&MDNS_ADDR, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

/// A UDP socket on `0.0.0.0:port` that can share the port with another
/// responder (mDNSResponder, avahi) already bound there.
fn shared_udp_socket(port: u16) -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).into())?;
    Ok(socket)
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(RAW_PREFIX_BYTES)
        .map(|b| format!("{b:02x}"))
        .collect()
}
