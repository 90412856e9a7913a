//! On-demand inspection of a single host.

use crate::config::ScanConfig;
use crate::constants::{service_name, MAX_RANGE_SPAN};
use crate::detect::hostname::reverse_names;
use crate::errors::ScanError;
use crate::model::{DeviceRecord, HostnameSource};
use crate::net::tcp::tcp_connect_with_banner;
use crate::net::{PlatformAdapter, PortState};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bytes read when grabbing a service banner
const BANNER_BYTES: usize = 256;
/// Probes in flight at once for a single host
const INSPECT_PARALLELISM: usize = 16;

/// One item of a port specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortToken {
    Icmp,
    Tcp(u16),
}

impl PortToken {
    pub fn service(&self) -> &'static str {
        match self {
            Self::Icmp => "icmp",
            Self::Tcp(port) => service_name(*port),
        }
    }
}

impl fmt::Display for PortToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icmp => f.write_str("icmp"),
            Self::Tcp(port) => write!(f, "{}", port),
        }
    }
}

/// Parse `icmp,22,80-82`. Ranges are inclusive and stop `MAX_RANGE_SPAN`
/// ports past their start.
pub fn parse_port_spec(spec: &str) -> Result<Vec<PortToken>, ScanError> {
    let mut tokens = Vec::new();
    for raw in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if raw.eq_ignore_ascii_case("icmp") {
            tokens.push(PortToken::Icmp);
        } else if let Some((a, b)) = raw.split_once('-') {
            let start = parse_port(a)?;
            let end = parse_port(b)?;
            if end < start {
                return Err(ScanError::InvalidPortSpec(format!("reversed range '{}'", raw)));
            }
            let end = end.min(start.saturating_add(MAX_RANGE_SPAN));
            tokens.extend((start..=end).map(PortToken::Tcp));
        } else {
            tokens.push(PortToken::Tcp(parse_port(raw)?));
        }
    }
    if tokens.is_empty() {
        return Err(ScanError::InvalidPortSpec("no ports given".to_string()));
    }
    Ok(tokens)
}

fn parse_port(raw: &str) -> Result<u16, ScanError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ScanError::InvalidPortSpec(format!("invalid port '{}'", raw.trim()))),
    }
}

/// Outcome of probing one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Position of the token in the port list
    pub index: usize,
    pub token: PortToken,
    pub state: PortState,
    pub service: &'static str,
    pub banner: Option<String>,
    pub elapsed: Duration,
}

/// Input order while a scan runs; by state (open, filtered, closed) then
/// input order once it is complete.
pub fn order_results(results: &mut [ProbeResult], complete: bool) {
    if complete {
        results.sort_by_key(|r| (r.state, r.index));
    } else {
        results.sort_by_key(|r| r.index);
    }
}

/// Probes a single host on request
#[derive(Clone)]
pub struct HostInspector {
    adapter: Arc<dyn PlatformAdapter>,
    connect_timeout: Duration,
    banner_timeout: Duration,
    ping_timeout: Duration,
    resolve_timeout: Duration,
}

impl HostInspector {
    pub fn new(adapter: Arc<dyn PlatformAdapter>, config: &ScanConfig) -> Self {
        Self {
            adapter,
            connect_timeout: config.inspect_timeout(),
            banner_timeout: config.banner_timeout(),
            ping_timeout: config.ping_timeout(),
            resolve_timeout: config.resolve_timeout(),
        }
    }

    async fn probe(&self, ip: Ipv4Addr, index: usize, token: PortToken) -> ProbeResult {
        let start = Instant::now();
        let (state, banner) = match token {
            PortToken::Icmp => {
                let alive = self.adapter.ping(ip, self.ping_timeout).await;
                let state = if alive { PortState::Open } else { PortState::Filtered };
                (state, None)
            }
            PortToken::Tcp(port) => {
                let (result, banner) = tcp_connect_with_banner(
                    ip,
                    port,
                    self.connect_timeout,
                    self.banner_timeout,
                    BANNER_BYTES,
                )
                .await;
                (result.state, banner)
            }
        };
        ProbeResult {
            index,
            token,
            state,
            service: token.service(),
            banner,
            elapsed: start.elapsed(),
        }
    }

    /// Probe every token, streaming each result to `progress` as it lands.
    /// Returns all results in final order.
    pub async fn scan_ports(
        &self,
        ip: Ipv4Addr,
        tokens: &[PortToken],
        progress: Option<mpsc::Sender<ProbeResult>>,
        cancel: &CancellationToken,
    ) -> Vec<ProbeResult> {
        debug!(%ip, tokens = tokens.len(), "inspecting host");
        let progress = progress.as_ref();
        let mut results: Vec<ProbeResult> = stream::iter(tokens.iter().copied().enumerate())
            .map(|(index, token)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let result = self.probe(ip, index, token).await;
                if let Some(tx) = progress {
                    let _ = tx.send(result.clone()).await;
                }
                Some(result)
            })
            .buffer_unordered(INSPECT_PARALLELISM)
            .filter_map(|r| async move { r })
            .collect()
            .await;
        order_results(&mut results, true);
        results
    }

    /// Live reverse lookup for devices whose name came from the DNS cache
    pub async fn dns_consistency(&self, record: &DeviceRecord) -> DnsConsistency {
        if record.hostname_source != HostnameSource::DnsCache || !record.has_hostname() {
            return DnsConsistency::NotApplicable;
        }
        let reverse = reverse_names(record.ip, self.resolve_timeout).await;
        DnsConsistency::evaluate(&record.hostname, reverse)
    }
}

/// Whether a cached forward name agrees with live reverse DNS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsConsistency {
    /// The name did not come from the DNS cache
    NotApplicable,
    Consistent { reverse: Vec<String> },
    Mismatch { cached: String, reverse: Vec<String> },
}

impl DnsConsistency {
    /// Consistent iff the cached name is among the reverse names, ignoring
    /// case and trailing dots
    pub fn evaluate(cached: &str, reverse: Vec<String>) -> Self {
        let wanted = normalize_name(cached);
        if reverse.iter().any(|r| normalize_name(r) == wanted) {
            Self::Consistent { reverse }
        } else {
            Self::Mismatch {
                cached: cached.to_string(),
                reverse,
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::NotApplicable => String::new(),
            Self::Consistent { .. } => "DNS: cache and reverse lookup agree".to_string(),
            Self::Mismatch { cached, reverse } if reverse.is_empty() => {
                format!("DNS: cached name {} has no reverse record", cached)
            }
            Self::Mismatch { cached, reverse } => format!(
                "DNS mismatch: cached {} but reverse says {}",
                cached,
                reverse.join(", ")
            ),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}
