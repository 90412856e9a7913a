use crate::detect::classify::classify_record;
use crate::detect::http::http_banner;
use crate::discovery::{DiscoveryContext, DiscoveryMode, DiscoveryStrategy};
use crate::errors::ScanError;
use crate::model::{DeviceRecord, HostObservation, HostnameSource};
use crate::net::tcp_connect;
use crate::resolver::HostnameResolver;
use crate::store::DeviceStore;
use futures::stream::{self, StreamExt};
use ipnetwork::Ipv4Network;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One-shot network scanner: discover, enrich, resolve, classify
pub struct NetworkScanner {
    ctx: DiscoveryContext,
    strategy: Arc<dyn DiscoveryStrategy>,
    http_banners: bool,
}

impl NetworkScanner {
    pub fn new(ctx: DiscoveryContext, mode: DiscoveryMode) -> Self {
        Self {
            strategy: mode.build(ctx.clone()),
            ctx,
            http_banners: true,
        }
    }

    /// Skip the HTTP banner step
    pub fn without_http_banners(mut self) -> Self {
        self.http_banners = false;
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Run the whole pipeline once and return the devices sorted by IP
    pub async fn scan(
        &self,
        network: Ipv4Network,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeviceRecord>, ScanError> {
        let scan_start = Instant::now();
        info!(%network, strategy = self.strategy.name(), "scan started");

        // Phase 1: host discovery
        let mut observations = self.strategy.discover(network, cancel).await?;
        info!(found = observations.len(), "discovery finished");

        // Phase 2: enrichment
        if !self.ctx.config.enrich_ports.is_empty() {
            self.probe_ports(&mut observations, cancel).await;
        }
        if self.http_banners {
            self.grab_banners(&mut observations, cancel).await;
        }

        // Phase 3: state and names
        let store = Arc::new(DeviceStore::new());
        store.merge(&observations, 1, scan_start);
        store.set_gateway(self.ctx.local.default_gateway());

        let resolver = HostnameResolver::new(
            store.clone(),
            self.ctx.adapter.clone(),
            self.ctx.limits.clone(),
            self.ctx.config.resolve_timeout(),
        );
        resolver.prime_from_cache().await;
        resolver.initial_pass(scan_start, cancel).await;

        store.update_all(|record| {
            if !record.has_hostname() {
                if let Some(guess) = record
                    .http_banner
                    .as_ref()
                    .and_then(|b| b.hostname_guess.clone())
                {
                    record.hostname = guess;
                    record.hostname_source = HostnameSource::Http;
                }
            }
            record.device_type = classify_record(record);
        });

        let devices = store.snapshot().devices;
        info!(
            devices = devices.len(),
            elapsed_ms = scan_start.elapsed().as_millis() as u64,
            "scan finished"
        );
        Ok(devices)
    }

    /// Probe `enrich_ports` on every online host and record the open ones
    async fn probe_ports(&self, observations: &mut [HostObservation], cancel: &CancellationToken) {
        let ports = &self.ctx.config.enrich_ports;
        let wait = self.ctx.config.tcp_timeout();
        let limits = &self.ctx.limits;
        let cap = limits.budget().scan.max(1);

        let results: Vec<(usize, Vec<u16>)> = stream::iter(observations.iter().enumerate())
            .filter(|(_, obs)| futures::future::ready(obs.online))
            .map(|(i, obs)| {
                let ip = obs.ip;
                async move {
                    let mut open = Vec::new();
                    for &port in ports {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let Some(_permit) = limits.scan_permit().await else {
                            break;
                        };
                        if tcp_connect(ip, port, wait).await.connected() {
                            open.push(port);
                        }
                    }
                    (i, open)
                }
            })
            .buffer_unordered(cap)
            .collect()
            .await;

        for (i, open) in results {
            let obs = &mut observations[i];
            let mut merged = obs.open_ports.take().unwrap_or_default();
            merged.extend(open);
            merged.sort_unstable();
            merged.dedup();
            debug!(ip = %obs.ip, ports = ?merged, "port probe");
            obs.open_ports = Some(merged);
        }
    }

    async fn grab_banners(&self, observations: &mut [HostObservation], cancel: &CancellationToken) {
        let wait = self.ctx.config.tcp_timeout().max(Duration::from_millis(500));
        let cap = self.ctx.limits.budget().scan.max(1);
        let targets: Vec<(usize, std::net::Ipv4Addr)> = observations
            .iter()
            .enumerate()
            .filter(|(_, o)| o.online)
            .map(|(i, o)| (i, o.ip))
            .collect();

        let banners: Vec<_> = stream::iter(targets)
            .map(|(i, ip)| async move {
                if cancel.is_cancelled() {
                    return (i, None);
                }
                (i, http_banner(ip, wait).await)
            })
            .buffer_unordered(cap)
            .collect()
            .await;

        for (i, banner) in banners {
            if let Some(banner) = banner {
                debug!(ip = %observations[i].ip, summary = %banner.summary(), "HTTP banner");
                observations[i].http_banner = Some(banner);
            }
        }
    }
}
