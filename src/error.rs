use std::net::IpAddr;

use thiserror::Error;

use crate::types::Capability;

/// Errors surfaced by discovery and the action dispatchers.
///
/// Probers (ping, port scan, ARP, mDNS) do not use this type for expected
/// failures; a closed port or empty ARP table is a normal result.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("scan already in progress")]
    ScanInProgress,

    #[error("no network interface found")]
    NoInterface,

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("{0} required")]
    MissingField(&'static str),

    #[error("device not found: {0}")]
    DeviceNotFound(IpAddr),

    #[error("device {ip} does not support {capability}")]
    MissingCapability { ip: IpAddr, capability: Capability },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown Sonos action: {0}")]
    UnknownSonosAction(String),

    #[error("{feature} is not yet implemented")]
    Unsupported {
        feature: &'static str,
        note: &'static str,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl DeviceError {
    /// Classify a reqwest failure: a client timeout becomes [`DeviceError::Timeout`].
    pub(crate) fn from_reqwest(err: reqwest::Error, operation: &'static str) -> Self {
        if err.is_timeout() {
            DeviceError::Timeout(operation)
        } else {
            DeviceError::Http(err)
        }
    }
}

pub type Result<T, E = DeviceError> = std::result::Result<T, E>;
