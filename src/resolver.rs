//! Hostname resolution cascade with per-device retry aging.

use crate::budget::{BudgetLimiter, ResolverSlot};
use crate::constants::HOSTNAME_MAX_AGE;
use crate::detect::classify::classify_record;
use crate::detect::{HostnameProbe, LlmnrProbe, MdnsProbe, NetbiosProbe, ReverseDnsProbe};
use crate::model::{DeviceRecord, HostnameSource};
use crate::net::PlatformAdapter;
use crate::store::DeviceStore;
use futures::stream::{self, StreamExt};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// True when the device has never been looked up or the last lookup is at
/// least `max_age` old. Applies to named and unnamed devices alike.
pub fn is_due(record: &DeviceRecord, reference: Instant, max_age: Duration) -> bool {
    match record.last_lookup {
        None => true,
        Some(last) => reference.saturating_duration_since(last) >= max_age,
    }
}

/// Runs the cache, initial and background resolution passes against a store
#[derive(Clone)]
pub struct HostnameResolver {
    store: Arc<DeviceStore>,
    adapter: Arc<dyn PlatformAdapter>,
    limits: BudgetLimiter,
    initial: Vec<Arc<dyn HostnameProbe>>,
    background: Vec<Arc<dyn HostnameProbe>>,
    probe_timeout: Duration,
    max_age: Duration,
}

impl HostnameResolver {
    /// Resolver with the standard probes: reverse DNS for the initial pass;
    /// NetBIOS, LLMNR, mDNS then reverse DNS for the background pass.
    pub fn new(
        store: Arc<DeviceStore>,
        adapter: Arc<dyn PlatformAdapter>,
        limits: BudgetLimiter,
        probe_timeout: Duration,
    ) -> Self {
        Self::with_probes(
            store,
            adapter,
            limits,
            probe_timeout,
            vec![Arc::new(ReverseDnsProbe)],
            vec![
                Arc::new(NetbiosProbe),
                Arc::new(LlmnrProbe),
                Arc::new(MdnsProbe),
                Arc::new(ReverseDnsProbe),
            ],
        )
    }

    pub fn with_probes(
        store: Arc<DeviceStore>,
        adapter: Arc<dyn PlatformAdapter>,
        limits: BudgetLimiter,
        probe_timeout: Duration,
        initial: Vec<Arc<dyn HostnameProbe>>,
        background: Vec<Arc<dyn HostnameProbe>>,
    ) -> Self {
        Self {
            store,
            adapter,
            limits,
            initial,
            background,
            probe_timeout,
            max_age: HOSTNAME_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Fill unnamed devices from the OS resolver cache. Returns how many got a name.
    pub async fn prime_from_cache(&self) -> usize {
        let cache = self.adapter.dns_cache().await;
        if cache.is_empty() {
            return 0;
        }
        let mut filled = 0;
        for (ip, name) in cache {
            let name = name.trim().trim_end_matches('.');
            if name.is_empty() {
                continue;
            }
            self.store.update(ip, |record| {
                if !record.has_hostname() {
                    record.hostname = name.to_string();
                    record.hostname_source = HostnameSource::DnsCache;
                    record.device_type = classify_record(record);
                    filled += 1;
                }
            });
        }
        debug!(filled, "primed hostnames from DNS cache");
        filled
    }

    /// Fast pass over online devices without a name. Only successful lookups
    /// are stamped, so failures stay eligible for the background pass.
    pub async fn initial_pass(&self, reference: Instant, cancel: &CancellationToken) -> usize {
        let candidates: Vec<Ipv4Addr> = self
            .store
            .snapshot_at(reference)
            .devices
            .iter()
            .filter(|d| d.is_online() && !d.has_hostname() && is_due(d, reference, self.max_age))
            .map(|d| d.ip)
            .collect();
        if candidates.is_empty() {
            return 0;
        }
        debug!(candidates = candidates.len(), "initial hostname pass");

        let resolved = self
            .fan_out(candidates, cancel, |ip| async move {
                let (name, source) = self.cascade(&self.initial, ip, cancel).await?;
                self.store.update(ip, |record| {
                    apply_name(record, name, source);
                    record.last_lookup = Some(reference);
                });
                Some(())
            })
            .await;
        debug!(resolved, "initial hostname pass done");
        resolved
    }

    /// Thorough pass over every online device whose last lookup has aged out.
    /// Always stamps the attempt; a device nobody names gets source `none`.
    pub async fn background_pass(&self, reference: Instant, cancel: &CancellationToken) -> usize {
        let candidates: Vec<Ipv4Addr> = self
            .store
            .snapshot_at(reference)
            .devices
            .iter()
            .filter(|d| d.is_online() && is_due(d, reference, self.max_age))
            .map(|d| d.ip)
            .collect();
        if candidates.is_empty() {
            return 0;
        }
        info!(candidates = candidates.len(), "background hostname pass");

        let resolved = self
            .fan_out(candidates, cancel, |ip| async move {
                let found = self.cascade(&self.background, ip, cancel).await;
                if cancel.is_cancelled() && found.is_none() {
                    return None;
                }
                self.store.update(ip, |record| {
                    record.last_lookup = Some(reference);
                    match &found {
                        Some((name, source)) => apply_name(record, name.clone(), *source),
                        None if !record.has_hostname() => {
                            record.hostname_source = HostnameSource::None;
                        }
                        None => {}
                    }
                });
                found.map(|_| ())
            })
            .await;
        info!(resolved, "background hostname pass done");
        resolved
    }

    /// Run `work` for each address with a resolver slot held, counting successes
    async fn fan_out<'a, F, Fut>(
        &'a self,
        candidates: Vec<Ipv4Addr>,
        cancel: &'a CancellationToken,
        work: F,
    ) -> usize
    where
        F: Fn(Ipv4Addr) -> Fut + 'a,
        Fut: std::future::Future<Output = Option<()>> + 'a,
    {
        let cap = self.limits.budget().dns.max(1);
        let work = &work;
        stream::iter(candidates)
            .map(|ip| async move {
                let _slot = self.acquire(cancel).await?;
                work(ip).await
            })
            .buffer_unordered(cap)
            .filter(|done| futures::future::ready(done.is_some()))
            .count()
            .await
    }

    /// A resolver slot, or `None` once cancellation was requested
    async fn acquire(&self, cancel: &CancellationToken) -> Option<ResolverSlot> {
        if cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = cancel.cancelled() => None,
            slot = self.limits.resolver_slot() => slot,
        }
    }

    /// First non-empty answer from `probes`, tried in order
    async fn cascade(
        &self,
        probes: &[Arc<dyn HostnameProbe>],
        ip: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Option<(String, HostnameSource)> {
        for probe in probes {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(name) = probe.lookup(ip, self.probe_timeout).await {
                let name = name.trim().trim_end_matches('.').to_string();
                if !name.is_empty() {
                    debug!(%ip, %name, source = %probe.source(), "hostname resolved");
                    return Some((name, probe.source()));
                }
            }
        }
        None
    }
}

fn apply_name(record: &mut DeviceRecord, name: String, source: HostnameSource) {
    record.hostname = name;
    record.hostname_source = source;
    record.device_type = classify_record(record);
}
