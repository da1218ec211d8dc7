use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::info;

use crate::error::{DeviceError, Result};

pub const MAGIC_PACKET_LEN: usize = 102;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl FromStr for MacAddr {
    type Err = DeviceError;

    /// Accepts exactly 12 hex digits once `:`, `-` and `.` separators are
    /// stripped.
    fn from_str(s: &str) -> Result<Self> {
        let hex: String = s.chars().filter(|c| !matches!(c, ':' | '-' | '.')).collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DeviceError::InvalidMac(s.to_string()));
        }
        let mut bytes = [0u8; 6];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| DeviceError::InvalidMac(s.to_string()))?;
        }
        Ok(MacAddr(bytes))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Six `0xFF` bytes followed by the MAC repeated sixteen times.
pub fn magic_packet(mac: &MacAddr) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.0);
    }
    packet
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WakeOutcome {
    pub success: bool,
    pub message: String,
}

/// Validate `mac` and broadcast a magic packet to `target`.
pub async fn wake_on_lan(mac: &str, target: SocketAddrV4) -> Result<WakeOutcome> {
    if mac.trim().is_empty() {
        return Err(DeviceError::MissingField("MAC address"));
    }
    let parsed: MacAddr = mac.parse()?;
    let packet = magic_packet(&parsed);

    let socket = UdpSocket::bind(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))).await?;
    socket.set_broadcast(true)?;
    socket.send_to(&packet, SocketAddr::V4(target)).await?;

    info!(mac = %parsed, %target, "sent Wake-on-LAN packet");
    Ok(WakeOutcome {
        success: true,
        message: format!("Wake-on-LAN sent to {mac}"),
    })
}
