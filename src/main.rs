use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use lan_devctl::config::DiscoveryConfig;
use lan_devctl::discovery::{Discovery, DiscoveryOptions};
use lan_devctl::types::DiscoveryReport;
use lan_devctl::{netdetect, ports, server};

/// Discover, classify and control devices on the local network.
#[derive(Debug, Parser)]
#[command(
    name = "lan-devctl",
    version,
    about = "Discover, classify and control devices on the local network.",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Args)]
struct Tuning {
    /// Path to ports list file (one port or range per line, or comma-separated).
    #[arg(long, global = true)]
    ports: Option<PathBuf>,

    /// Per-port connect timeout during discovery, in milliseconds.
    #[arg(long = "port-timeout-ms", global = true)]
    port_timeout_ms: Option<u64>,

    /// mDNS listen window during discovery, in milliseconds.
    #[arg(long = "mdns-window-ms", global = true)]
    mdns_window_ms: Option<u64>,

    /// Evict cached devices not seen for this many seconds.
    #[arg(long = "registry-ttl-secs", global = true)]
    registry_ttl_secs: Option<u64>,

    /// Maximum number of cached devices.
    #[arg(long = "registry-capacity", global = true)]
    registry_capacity: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the device API (default).
    Serve {
        /// Address to bind the HTTP API to.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Run one discovery pass and print the devices found.
    Discover {
        /// Also TCP-ping every host of the local /24.
        #[arg(long)]
        sweep: bool,

        /// Write the report as pretty JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show local IPv4 interfaces and their subnets.
    Info,
    /// Send a Wake-on-LAN magic packet.
    Wake {
        /// Target MAC, e.g. AA:BB:CC:DD:EE:FF.
        mac: String,
    },
}

impl Tuning {
    fn into_config(self) -> DiscoveryConfig {
        let mut config = DiscoveryConfig::default();
        if let Some(path) = self.ports.as_deref() {
            config.ports = ports::load_ports_or_default(path);
        }
        if let Some(ms) = self.port_timeout_ms {
            config.discovery_port_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.mdns_window_ms {
            config.mdns_window = Duration::from_millis(ms);
        }
        if let Some(secs) = self.registry_ttl_secs {
            config.registry_ttl = Duration::from_secs(secs);
        }
        if let Some(n) = self.registry_capacity {
            config.registry_capacity = n;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("parsed CLI arguments: {:?}", cli);

    let config = cli.tuning.into_config();
    let discovery = Arc::new(Discovery::new(config));

    match cli.command.unwrap_or(Command::Serve {
        bind: "127.0.0.1:8080".to_string(),
    }) {
        Command::Serve { bind } => {
            println!("Device API at http://{bind}/api/network (Ctrl+C to stop)");
            server::spawn_server(&bind, discovery).await?;
        }
        Command::Discover { sweep, output } => {
            let report = discovery
                .discover(DiscoveryOptions { ports: None, sweep })
                .await
                .context("discovery failed")?;
            print_report_table(&report);
            if let Some(path) = output.as_deref() {
                write_report_json(path, &report)?;
                println!("Wrote JSON report to {}", path.display());
            }
        }
        Command::Info => {
            let networks = netdetect::get_network_info();
            if networks.is_empty() {
                println!("No non-loopback IPv4 interfaces found.");
            }
            for n in networks {
                println!(
                    "{:<12} {:<15} mask {:<15} subnet {:<18} mac {}",
                    n.interface_name,
                    n.address,
                    n.netmask,
                    n.subnet,
                    n.mac.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Wake { mac } => {
            let outcome = discovery.wake_on_lan(&mac).await?;
            println!("{}", outcome.message);
        }
    }

    Ok(())
}

fn print_report_table(report: &DiscoveryReport) {
    let mut ip_w = "ip".len();
    let mut vendor_w = "vendor".len();
    for d in &report.devices {
        ip_w = ip_w.max(d.ip().to_string().len());
        vendor_w = vendor_w.max(d.vendor().map_or(1, str::len).min(24));
    }
    let type_w = "smartHome".len();

    println!(
        "\nNetwork {} via {}: {} devices in {}ms",
        report.network.subnet, report.network.interface_name, report.count, report.duration
    );
    println!(
        "{:<ip_w$}  {:<type_w$}  {:<vendor_w$}  {:<20}  capabilities",
        "ip", "type", "vendor", "open ports",
    );
    println!(
        "{:-<ip_w$}  {:-<type_w$}  {:-<vendor_w$}  {:-<20}  {:-<12}",
        "", "", "", "", "",
    );
    for d in &report.devices {
        let mut vendor = d.vendor().unwrap_or("-").to_string();
        vendor.truncate(24);
        let ports: Vec<String> = d.open_ports().iter().map(u16::to_string).collect();
        let caps: Vec<&str> = d.capabilities().iter().map(|c| c.as_str()).collect();
        println!(
            "{:<ip_w$}  {:<type_w$}  {:<vendor_w$}  {:<20}  {}",
            d.ip(),
            d.device_type().as_str(),
            vendor,
            ports.join(","),
            caps.join(","),
        );
    }
}

fn write_report_json(path: &Path, report: &DiscoveryReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
