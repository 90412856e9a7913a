use super::{DiscoveryContext, DiscoveryStrategy};
use crate::constants::{CONSERVATIVE_PROBE_CAP, FAST_PORTS};
use crate::errors::ScanError;
use crate::model::HostObservation;
use crate::net::{host_addresses, tcp_connect};
use async_trait::async_trait;
use futures::stream::{self, FuturesUnordered, StreamExt};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Hosts probed at once so that open sockets stay within `scan_cap` when
/// each host opens `sockets_per_host` connections in parallel
pub fn hosts_in_flight(scan_cap: usize, sockets_per_host: usize) -> usize {
    (scan_cap / sockets_per_host.max(1)).max(1)
}

/// Run `probe` for every host in `network`, bounded by the scan budget,
/// skipping hosts once `cancel` fires.
async fn sweep<F, Fut>(
    ctx: &DiscoveryContext,
    network: Ipv4Network,
    sockets_per_host: usize,
    cancel: &CancellationToken,
    probe: F,
) -> Vec<HostObservation>
where
    F: Fn(Ipv4Addr) -> Fut,
    Fut: std::future::Future<Output = Option<HostObservation>>,
{
    let cap = hosts_in_flight(ctx.limits.budget().scan, sockets_per_host);
    debug!(hosts = cap, sockets_per_host, "sweep parallelism");
    let probe = &probe;
    let mut found: Vec<HostObservation> = stream::iter(host_addresses(network))
        .map(|ip| async move {
            if cancel.is_cancelled() {
                return None;
            }
            let _permit = ctx.limits.scan_permit().await?;
            if cancel.is_cancelled() {
                return None;
            }
            probe(ip).await
        })
        .buffer_unordered(cap)
        .filter_map(|obs| async move { obs })
        .collect()
        .await;
    found.sort_by_key(|obs| obs.ip);
    found
}

/// Probe every port at once with `wait` each.
/// Returns the open ports in input order and the quickest successful connect.
async fn probe_ports(ip: Ipv4Addr, ports: &[u16], wait: Duration) -> (Vec<u16>, Option<Duration>) {
    let mut probes: FuturesUnordered<_> = ports
        .iter()
        .map(|&port| async move { (port, tcp_connect(ip, port, wait).await) })
        .collect();

    let mut open = Vec::new();
    let mut first: Option<Duration> = None;
    while let Some((port, result)) = probes.next().await {
        if result.connected() {
            open.push(port);
            first = Some(first.map_or(result.elapsed, |f| f.min(result.elapsed)));
        }
    }
    open.sort_by_key(|p| ports.iter().position(|q| q == p));
    (open, first)
}

/// Concurrent connects to a few high-signal ports; any success means online
pub struct ConservativeStrategy {
    ctx: DiscoveryContext,
}

impl ConservativeStrategy {
    pub fn new(ctx: DiscoveryContext) -> Self {
        Self { ctx }
    }

    /// The host budget split across the probed ports, never above the cap
    pub fn probe_timeout(&self) -> Duration {
        let ports = self.ctx.config.discovery_ports.len().max(1) as u32;
        (self.ctx.config.tcp_timeout() / ports).min(CONSERVATIVE_PROBE_CAP)
    }
}

#[async_trait]
impl DiscoveryStrategy for ConservativeStrategy {
    async fn discover(
        &self,
        network: Ipv4Network,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostObservation>, ScanError> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        let wait = self.probe_timeout();
        let ports = &self.ctx.config.discovery_ports;
        info!(%network, ports = ?ports, wait_ms = wait.as_millis() as u64, "conservative discovery");

        let found = sweep(&self.ctx, network, ports.len(), cancel, |ip| async move {
            let (open, rtt) = probe_ports(ip, ports, wait).await;
            let rtt = rtt?;
            debug!(%ip, ?open, "host answered");
            Some(HostObservation::online(ip).with_rtt(rtt).with_ports(open))
        })
        .await;
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "conservative"
    }
}

/// One connect per host: 80, then 443, then 445
pub struct FastStrategy {
    ctx: DiscoveryContext,
}

impl FastStrategy {
    pub fn new(ctx: DiscoveryContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DiscoveryStrategy for FastStrategy {
    async fn discover(
        &self,
        network: Ipv4Network,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostObservation>, ScanError> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        let wait = (self.ctx.config.tcp_timeout() / FAST_PORTS.len() as u32).max(Duration::from_millis(50));
        info!(%network, wait_ms = wait.as_millis() as u64, "fast discovery");

        let found = sweep(&self.ctx, network, 1, cancel, |ip| async move {
            for port in FAST_PORTS {
                if cancel.is_cancelled() {
                    return None;
                }
                let result = tcp_connect(ip, port, wait).await;
                if result.connected() {
                    debug!(%ip, port, "host answered");
                    return Some(HostObservation::online(ip).with_rtt(result.elapsed));
                }
            }
            None
        })
        .await;
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "fast"
    }
}

/// Broad port set; a port only counts when two sequential connects succeed
pub struct ThoroughStrategy {
    ctx: DiscoveryContext,
}

impl ThoroughStrategy {
    pub fn new(ctx: DiscoveryContext) -> Self {
        Self { ctx }
    }
}

/// Re-connect to every port that answered once and keep those that answer again
async fn validate_ports(ip: Ipv4Addr, candidates: Vec<u16>, wait: Duration) -> Vec<u16> {
    let mut confirmed = Vec::new();
    for port in candidates {
        if tcp_connect(ip, port, wait).await.connected() {
            confirmed.push(port);
        } else {
            debug!(%ip, port, "port failed second connect");
        }
    }
    confirmed
}

#[async_trait]
impl DiscoveryStrategy for ThoroughStrategy {
    async fn discover(
        &self,
        network: Ipv4Network,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostObservation>, ScanError> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        let wait = self.ctx.config.tcp_timeout();
        let ports = &self.ctx.config.thorough_ports;
        info!(%network, ports = ports.len(), "thorough discovery");

        let found = sweep(&self.ctx, network, ports.len(), cancel, |ip| async move {
            let (open, rtt) = probe_ports(ip, ports, wait).await;
            let rtt = rtt?;
            if cancel.is_cancelled() {
                return None;
            }
            let confirmed = validate_ports(ip, open, wait).await;
            if confirmed.is_empty() {
                return None;
            }
            debug!(%ip, ports = ?confirmed, "host confirmed");
            Some(HostObservation::online(ip).with_rtt(rtt).with_ports(confirmed))
        })
        .await;
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "thorough"
    }
}
