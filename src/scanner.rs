use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::probe::NetworkProbe;
use crate::types::PingResult;

/// Ports issued concurrently per host; batches run one after another.
pub const PORT_BATCH_SIZE: usize = 10;

/// Port used by the TCP reachability check.
pub const PING_PORT: u16 = 80;

/// Attempt a TCP connect, bounded by `timeout`.
///
/// Returns the connect latency in milliseconds on success. Refused, filtered
/// and timed-out connects all come back as `None`.
pub async fn probe_tcp(addr: SocketAddr, timeout: Duration) -> Option<u64> {
    let start = Instant::now();
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Some(start.elapsed().as_millis() as u64),
        _ => None,
    }
}

/// TCP "ping": a connect to port 80. Not ICMP, so hosts that drop port 80
/// are reported as not alive.
pub async fn ping_host(ip: IpAddr, timeout: Duration) -> PingResult {
    match probe_tcp(SocketAddr::new(ip, PING_PORT), timeout).await {
        Some(latency) => PingResult {
            alive: true,
            latency: Some(latency),
        },
        None => PingResult::default(),
    }
}

/// Scan `ports` on `ip` and return the open ones in ascending order.
///
/// Ports are probed in batches of [`PORT_BATCH_SIZE`]; every port in a batch
/// resolves (open, closed or timed out) before the next batch starts, so the
/// call is bounded by roughly `ceil(ports / batch) * timeout`.
pub async fn scan_ports(ip: IpAddr, ports: &[u16], timeout: Duration) -> Vec<u16> {
    let mut open = Vec::new();
    for batch in ports.chunks(PORT_BATCH_SIZE) {
        let results = join_all(batch.iter().map(|&port| async move {
            probe_tcp(SocketAddr::new(ip, port), timeout)
                .await
                .map(|_| port)
        }))
        .await;
        open.extend(results.into_iter().flatten());
    }
    open.sort_unstable();
    open.dedup();
    debug!(%ip, ?open, "port scan finished");
    open
}

/// TCP-ping every target with a concurrency limit and return the live ones.
///
/// - Limits concurrent pings using a `Semaphore`.
/// - Stops issuing new pings once `cancel` fires; pings in flight still finish.
pub async fn sweep_hosts(
    probe: Arc<dyn NetworkProbe>,
    targets: &[IpAddr],
    concurrency: usize,
    timeout: Duration,
    cancel: CancellationToken,
) -> Vec<IpAddr> {
    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, 1_024)));
    let mut set = JoinSet::new();

    for &ip in targets {
        if cancel.is_cancelled() {
            break;
        }
        let permit = match sem.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => break,
        };
        let probe = probe.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let _permit = permit;
            if cancel.is_cancelled() {
                return None;
            }
            probe.ping(ip, timeout).await.alive.then_some(ip)
        });
    }

    let mut alive = Vec::new();
    while let Some(res) = set.join_next().await {
        if let Ok(Some(ip)) = res {
            alive.push(ip);
        }
    }
    alive.sort();
    alive
}
