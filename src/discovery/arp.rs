use super::tcp::ConservativeStrategy;
use super::{DiscoveryContext, DiscoveryStrategy};
use crate::errors::ScanError;
use crate::model::HostObservation;
use crate::net::arp::observations_in;
use crate::net::host_addresses;
use crate::net::ping::parallel_ping_sweep;
use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ping sweep to seed the kernel neighbour cache, then read it back.
///
/// Remote targets have no neighbour cache entries, so they go through the
/// conservative TCP strategy instead. The hybrid flavour also adds this
/// machine when it sits inside the target and falls back to TCP when the
/// cache comes back empty.
pub struct ArpStrategy {
    ctx: DiscoveryContext,
    hybrid: bool,
    fallback: ConservativeStrategy,
}

impl ArpStrategy {
    pub fn arp(ctx: DiscoveryContext) -> Self {
        Self::with_flavour(ctx, false)
    }

    pub fn hybrid(ctx: DiscoveryContext) -> Self {
        Self::with_flavour(ctx, true)
    }

    fn with_flavour(ctx: DiscoveryContext, hybrid: bool) -> Self {
        Self {
            fallback: ConservativeStrategy::new(ctx.clone()),
            ctx,
            hybrid,
        }
    }

    /// Our own address and MAC, when we sit inside `network`
    fn self_observation(&self, network: Ipv4Network) -> Option<HostObservation> {
        let ip = self.ctx.local.local_ip_in(network)?;
        let mut obs = HostObservation::online(ip);
        obs.mac = self.ctx.local.local_mac_in(network);
        Some(obs)
    }

    async fn neighbour_cache(&self, network: Ipv4Network) -> Option<Vec<HostObservation>> {
        match self.ctx.adapter.arp_table().await {
            Ok(entries) => Some(observations_in(network, &entries)),
            Err(e) => {
                warn!(error = %e, "ARP table unavailable, using TCP discovery");
                None
            }
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for ArpStrategy {
    async fn discover(
        &self,
        network: Ipv4Network,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostObservation>, ScanError> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        if !self.ctx.local.is_local_subnet(network) {
            info!(%network, "target is not attached, using TCP discovery");
            return self.fallback.discover(network, cancel).await;
        }

        let hosts: Vec<Ipv4Addr> = host_addresses(network).collect();
        info!(%network, hosts = hosts.len(), strategy = self.name(), "seeding ARP cache");
        let answered = parallel_ping_sweep(
            self.ctx.adapter.as_ref(),
            &hosts,
            self.ctx.config.ping_timeout(),
            &self.ctx.limits,
            cancel,
        )
        .await;
        debug!(answered = answered.len(), "ping sweep finished");

        tokio::select! {
            _ = cancel.cancelled() => return Ok(Vec::new()),
            _ = tokio::time::sleep(Duration::from_millis(self.ctx.config.arp_settle_ms)) => {}
        }

        let mut observations = match self.neighbour_cache(network).await {
            Some(found) if !found.is_empty() || !self.hybrid => found,
            _ => {
                info!(%network, "ARP cache empty, using TCP discovery");
                self.fallback.discover(network, cancel).await?
            }
        };

        if self.hybrid {
            if let Some(own) = self.self_observation(network) {
                if !observations.iter().any(|o| o.ip == own.ip) {
                    observations.push(own);
                    observations.sort_by_key(|o| o.ip);
                }
            }
        }

        self.ctx.annotate_vendors(&mut observations);
        Ok(observations)
    }

    fn name(&self) -> &'static str {
        if self.hybrid {
            "hybrid"
        } else {
            "arp"
        }
    }
}
