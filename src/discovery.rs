use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use ipnet::IpNet;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::http::{self, HttpOutcome, HttpRequestOptions};
use crate::actions::print::{self, PrintOptions, PrintOutcome};
use crate::actions::sonos::{self, SonosAction, SonosOutcome};
use crate::actions::wol::{self, WakeOutcome};
use crate::actions::{ActionOutcome, DeviceAction};
use crate::config::DiscoveryConfig;
use crate::error::{DeviceError, Result};
use crate::netdetect;
use crate::probe::{NetworkProbe, SystemProbe};
use crate::registry::DeviceRegistry;
use crate::scanner;
use crate::types::{
    ArpEntry, Capability, Device, DiscoveryReport, HostCandidate, MdnsResponse, NetworkInterface,
    PingResult,
};

/// Per-call overrides for [`Discovery::discover`].
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Ports to probe instead of the configured list.
    pub ports: Option<Vec<u16>>,
    /// Also TCP-ping every host of the local /24, not just ARP/mDNS hosts.
    pub sweep: bool,
}

/// Owns discovery state: the device registry, the single-flight scan flag
/// and the cached local network. Construct once and share behind an `Arc`.
pub struct Discovery {
    probe: Arc<dyn NetworkProbe>,
    config: DiscoveryConfig,
    registry: DeviceRegistry,
    scanning: AtomicBool,
    local_network: RwLock<Option<NetworkInterface>>,
    cancel: CancellationToken,
}

/// Holds the scanning flag; clears it on drop, including early returns and
/// dropped futures.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanGuard(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self::with_probe(Arc::new(SystemProbe), config)
    }

    pub fn with_probe(probe: Arc<dyn NetworkProbe>, config: DiscoveryConfig) -> Self {
        let registry = DeviceRegistry::new(config.registry_ttl, config.registry_capacity);
        Self {
            probe,
            config,
            registry,
            scanning: AtomicBool::new(false),
            local_network: RwLock::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Stop any subnet sweep in progress and refuse to start new ones.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Local interfaces. The first one becomes the default local network.
    pub fn network_info(&self) -> Vec<NetworkInterface> {
        let networks = self.probe.interfaces();
        if let Ok(mut slot) = self.local_network.write() {
            *slot = networks.first().cloned();
        }
        networks
    }

    /// The network resolved by the last [`Discovery::network_info`] call.
    pub fn local_network(&self) -> Option<NetworkInterface> {
        self.local_network.read().ok().and_then(|n| n.clone())
    }

    /// Full discovery: ARP + mDNS, port scan every candidate, classify,
    /// drop noise, store survivors.
    ///
    /// Only one discovery runs at a time; a concurrent call gets
    /// [`DeviceError::ScanInProgress`] immediately.
    pub async fn discover(&self, opts: DiscoveryOptions) -> Result<DiscoveryReport> {
        let _guard = ScanGuard::acquire(&self.scanning).ok_or(DeviceError::ScanInProgress)?;
        let started = Instant::now();

        let network = self
            .network_info()
            .into_iter()
            .next()
            .ok_or(DeviceError::NoInterface)?;
        info!(subnet = %network.subnet, interface = %network.interface_name, "scanning network");

        let (arp, mdns) = tokio::join!(
            self.probe.arp_table(self.config.arp_timeout),
            self.probe.mdns(self.config.mdns_window),
        );
        info!(arp = arp.len(), mdns = mdns.len(), "host sources collected");

        let mut candidates = merge_candidates(arp, mdns);

        if opts.sweep {
            let targets: Vec<IpAddr> = netdetect::expand_cidr_to_ips(IpNet::V4(network.subnet))
                .into_iter()
                .filter(|ip| !candidates.contains_key(ip))
                .collect();
            let alive = scanner::sweep_hosts(
                self.probe.clone(),
                &targets,
                self.config.sweep_concurrency,
                self.config.ping_timeout,
                self.cancel.child_token(),
            )
            .await;
            info!(swept = targets.len(), alive = alive.len(), "subnet sweep finished");
            for ip in alive {
                candidates.entry(ip).or_insert_with(|| HostCandidate::new(ip));
            }
        }

        let ports = opts.ports.unwrap_or_else(|| self.config.ports.clone());
        info!(hosts = candidates.len(), ports = ports.len(), "port scanning candidates");

        let timeout = self.config.discovery_port_timeout;
        let probe = &self.probe;
        let ports = &ports;
        let scanned = join_all(candidates.into_values().map(|candidate| async move {
            let open = probe.scan_ports(candidate.ip, ports, timeout).await;
            let device = Device::from_scan(candidate, open);
            debug!(ip = %device.ip(), kind = %device.device_type(), "classified host");
            device
        }))
        .await;

        let devices: Vec<Device> = scanned.into_iter().filter(|d| !d.is_noise()).collect();
        self.registry.upsert_all(devices.iter().cloned()).await;

        let duration = started.elapsed().as_millis() as u64;
        info!(devices = devices.len(), duration_ms = duration, "discovery complete");
        Ok(DiscoveryReport {
            network,
            count: devices.len(),
            devices,
            duration,
        })
    }

    /// Liveness refresh of cached devices without rescanning ports.
    pub async fn quick_scan(&self) -> Vec<Device> {
        self.registry
            .quick_scan(self.probe.as_ref(), self.config.quick_scan_timeout)
            .await
    }

    pub async fn cached_devices(&self) -> Vec<Device> {
        self.registry.list().await
    }

    pub async fn device(&self, ip: IpAddr) -> Option<Device> {
        self.registry.get(ip).await
    }

    pub async fn ping(&self, ip: IpAddr) -> PingResult {
        self.probe.ping(ip, self.config.ping_timeout).await
    }

    /// Scan the configured ports on one host.
    pub async fn scan_ports(&self, ip: IpAddr) -> Vec<u16> {
        self.probe
            .scan_ports(ip, &self.config.ports, self.config.port_timeout)
            .await
    }

    /// Cached device, or a live scan of an uncached IP.
    ///
    /// A live result is classified but not stored; `None` if nothing answers.
    pub async fn lookup_or_scan(&self, ip: IpAddr) -> Option<Device> {
        if let Some(device) = self.registry.get(ip).await {
            return Some(device);
        }
        let open = self.scan_ports(ip).await;
        if open.is_empty() {
            return None;
        }
        Some(Device::from_scan(HostCandidate::new(ip), open))
    }

    pub async fn wake_on_lan(&self, mac: &str) -> Result<WakeOutcome> {
        wol::wake_on_lan(mac, self.config.wol_target).await
    }

    /// Wake a cached device using the MAC learned from ARP.
    pub async fn wake_device(&self, ip: IpAddr) -> Result<WakeOutcome> {
        let device = self.require_device(ip).await?;
        let mac = device.mac().ok_or(DeviceError::MissingField("MAC address"))?;
        self.wake_on_lan(mac).await
    }

    pub async fn print_to_device(
        &self,
        ip: IpAddr,
        content: &str,
        options: &PrintOptions,
    ) -> Result<PrintOutcome> {
        if content.is_empty() {
            return Err(DeviceError::MissingField("content"));
        }
        self.require_capability(ip, Capability::Print).await?;
        print::print_raw(
            SocketAddr::new(ip, options.port),
            content.as_bytes(),
            options,
            self.config.print_timeout,
        )
        .await
    }

    /// Run a named Sonos action. Unknown names fail before any lookup or I/O.
    pub async fn control_sonos(&self, ip: IpAddr, action: &str, params: &Value) -> Result<SonosOutcome> {
        let action = SonosAction::parse(action, params)?;
        self.send_sonos(ip, action).await
    }

    async fn send_sonos(&self, ip: IpAddr, action: SonosAction) -> Result<SonosOutcome> {
        self.require_capability(ip, Capability::Sonos).await?;
        sonos::send_sonos_action(ip, self.config.sonos_port, action, self.config.http_timeout).await
    }

    pub async fn http_request(&self, ip: IpAddr, opts: &HttpRequestOptions) -> Result<HttpOutcome> {
        http::http_request(ip, opts, self.config.http_timeout).await
    }

    pub async fn execute_ssh(&self, ip: IpAddr, command: &str) -> Result<ActionOutcome> {
        warn!(%ip, command, "SSH execution requested");
        Err(DeviceError::Unsupported {
            feature: "SSH execution",
            note: "requires an SSH client and configured credentials",
        })
    }

    pub async fn control_cast(&self, ip: IpAddr, action: &str) -> Result<ActionOutcome> {
        warn!(%ip, action, "Cast control requested");
        Err(DeviceError::Unsupported {
            feature: "Cast control",
            note: "requires a Cast v2 protocol client",
        })
    }

    /// Route an action to its dispatcher. The device must be cached.
    pub async fn perform_action(&self, ip: IpAddr, action: DeviceAction) -> Result<ActionOutcome> {
        self.require_device(ip).await?;
        let outcome = match action {
            DeviceAction::Wake => ActionOutcome::Wake(self.wake_device(ip).await?),
            DeviceAction::Print { content, options } => {
                ActionOutcome::Print(self.print_to_device(ip, &content, &options).await?)
            }
            DeviceAction::Sonos(a) => ActionOutcome::Sonos(self.send_sonos(ip, a).await?),
            DeviceAction::Http(opts) => ActionOutcome::Http(self.http_request(ip, &opts).await?),
            DeviceAction::Ping => ActionOutcome::Ping {
                success: true,
                ping: self.ping(ip).await,
            },
            DeviceAction::Scan => ActionOutcome::Scan {
                success: true,
                open_ports: self.scan_ports(ip).await,
            },
            DeviceAction::Ssh { command } => return self.execute_ssh(ip, &command).await,
            DeviceAction::Cast { action } => return self.control_cast(ip, &action).await,
        };
        Ok(outcome)
    }

    async fn require_device(&self, ip: IpAddr) -> Result<Device> {
        self.registry
            .get(ip)
            .await
            .ok_or(DeviceError::DeviceNotFound(ip))
    }

    async fn require_capability(&self, ip: IpAddr, capability: Capability) -> Result<Device> {
        let device = self.require_device(ip).await?;
        if !device.has_capability(capability) {
            return Err(DeviceError::MissingCapability { ip, capability });
        }
        Ok(device)
    }
}

/// Key ARP and mDNS sightings by IP. ARP seeds the map; an mDNS reply marks
/// an existing entry or adds a bare one.
pub fn merge_candidates(
    arp: Vec<ArpEntry>,
    mdns: Vec<MdnsResponse>,
) -> BTreeMap<IpAddr, HostCandidate> {
    let mut map: BTreeMap<IpAddr, HostCandidate> = arp
        .into_iter()
        .map(|e| (IpAddr::V4(e.ip), HostCandidate::from(e)))
        .collect();
    for reply in mdns {
        map.entry(reply.ip)
            .or_insert_with(|| HostCandidate::new(reply.ip))
            .mdns = true;
    }
    map
}
