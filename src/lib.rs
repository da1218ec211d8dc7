//! Library crate for lan-devctl: LAN device discovery, classification and control.
pub mod actions;
pub mod arp;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod mdns;
pub mod netdetect;
pub mod ports;
pub mod probe;
pub mod registry;
pub mod scanner;
pub mod server;
pub mod types;
pub mod vendor;

pub use config::DiscoveryConfig;
pub use discovery::{Discovery, DiscoveryOptions};
pub use error::DeviceError;
pub use probe::{NetworkProbe, SystemProbe};
pub use types::{Capability, Device, DeviceType};
