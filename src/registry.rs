use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::probe::NetworkProbe;
use crate::types::{Capability, Device, DeviceType};

/// In-memory cache of the last known record per IP.
///
/// Entries are refreshed in place, never replaced. Records not refreshed
/// within `ttl` are evicted, and when more than `capacity` remain the least
/// recently refreshed go first.
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<IpAddr, Device>>,
    ttl: Duration,
    capacity: usize,
}

impl DeviceRegistry {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Insert or refresh each device by IP, then evict.
    pub async fn upsert_all(&self, devices: impl IntoIterator<Item = Device>) {
        let mut map = self.devices.write().await;
        for device in devices {
            match map.get_mut(&device.ip()) {
                Some(existing) => existing.refresh_from(device),
                None => {
                    map.insert(device.ip(), device);
                }
            }
        }
        self.evict(&mut map);
    }

    pub async fn upsert(&self, device: Device) {
        self.upsert_all([device]).await;
    }

    /// Snapshot of every cached device, ordered by IP.
    pub async fn list(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn get(&self, ip: IpAddr) -> Option<Device> {
        self.devices.read().await.get(&ip).cloned()
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    pub async fn by_type(&self, device_type: DeviceType) -> Vec<Device> {
        self.devices
            .read()
            .await
            .values()
            .filter(|d| d.device_type() == device_type)
            .cloned()
            .collect()
    }

    pub async fn by_capability(&self, capability: Capability) -> Vec<Device> {
        self.devices
            .read()
            .await
            .values()
            .filter(|d| d.has_capability(capability))
            .cloned()
            .collect()
    }

    /// Re-ping every cached device and update `online`, `latency` and
    /// `lastSeen` in place. Ports and classification are left alone.
    ///
    /// Returns the devices that answered.
    pub async fn quick_scan(&self, probe: &dyn NetworkProbe, timeout: Duration) -> Vec<Device> {
        let ips: Vec<IpAddr> = self.devices.read().await.keys().copied().collect();
        let pings = join_all(ips.iter().map(|&ip| probe.ping(ip, timeout))).await;

        let mut map = self.devices.write().await;
        let mut alive = Vec::new();
        for (ip, ping) in ips.into_iter().zip(pings) {
            // Evicted or replaced while we were pinging.
            let Some(device) = map.get_mut(&ip) else {
                continue;
            };
            if ping.alive {
                device.mark_alive(ping.latency);
                alive.push(device.clone());
            } else {
                device.mark_offline();
            }
        }
        self.evict(&mut map);
        info!(alive = alive.len(), cached = map.len(), "quick scan complete");
        alive
    }

    fn evict(&self, map: &mut BTreeMap<IpAddr, Device>) {
        let before = map.len();
        let ttl = self.ttl;
        map.retain(|_, d| d.refreshed_at().map_or(true, |t| t.elapsed() <= ttl));

        if map.len() > self.capacity {
            let mut by_age: Vec<(IpAddr, Option<std::time::Instant>)> =
                map.iter().map(|(ip, d)| (*ip, d.refreshed_at())).collect();
            by_age.sort_by_key(|(_, t)| *t);
            let excess = map.len() - self.capacity;
            for (ip, _) in by_age.into_iter().take(excess) {
                map.remove(&ip);
            }
        }

        if map.len() != before {
            debug!(evicted = before - map.len(), "registry eviction");
        }
    }
}
