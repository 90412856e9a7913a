use super::platform::PlatformAdapter;
use crate::budget::BudgetLimiter;
use futures::stream::{self, StreamExt};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Ping every address concurrently, bounded by the scan budget.
/// Used to populate the kernel ARP cache; returns the addresses that answered.
pub async fn parallel_ping_sweep(
    adapter: &dyn PlatformAdapter,
    hosts: &[Ipv4Addr],
    ping_timeout: Duration,
    limits: &BudgetLimiter,
    cancel: &CancellationToken,
) -> Vec<Ipv4Addr> {
    let cap = limits.budget().scan.max(1);
    stream::iter(hosts.iter().copied())
        .map(|ip| async move {
            if cancel.is_cancelled() {
                return None;
            }
            let _permit = limits.scan_permit().await?;
            if cancel.is_cancelled() {
                return None;
            }
            adapter.ping(ip, ping_timeout).await.then_some(ip)
        })
        .buffer_unordered(cap)
        .filter_map(|result| async move { result })
        .collect()
        .await
}
