//! Host discovery strategies.
//!
//! A strategy turns a target network into the set of hosts that answered.
//! `arp` and `hybrid` lean on the kernel neighbour cache and only work on
//! attached subnets; `conservative`, `fast` and `thorough` use TCP connects
//! and work anywhere routable.

use crate::budget::BudgetLimiter;
use crate::config::ScanConfig;
use crate::db::VendorDb;
use crate::errors::ScanError;
use crate::model::HostObservation;
use crate::net::{LocalNetwork, PlatformAdapter};
use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod arp;
pub mod tcp;

pub use arp::ArpStrategy;
pub use tcp::{ConservativeStrategy, FastStrategy, ThoroughStrategy};

/// Discovery strategy trait
///
/// Each strategy implements one way of finding live hosts in a subnet. It
/// must check `cancel` between probes and return whatever it has found so
/// far instead of failing when cancelled.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    async fn discover(
        &self,
        network: Ipv4Network,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostObservation>, ScanError>;

    /// Return a human-readable name for this strategy
    fn name(&self) -> &'static str;
}

/// Everything a strategy needs from the outside world
#[derive(Clone)]
pub struct DiscoveryContext {
    pub config: Arc<ScanConfig>,
    pub adapter: Arc<dyn PlatformAdapter>,
    pub local: Arc<LocalNetwork>,
    pub vendors: Arc<VendorDb>,
    pub limits: BudgetLimiter,
}

impl DiscoveryContext {
    /// Fill in vendors for every observation that carries a MAC
    pub fn annotate_vendors(&self, observations: &mut [HostObservation]) {
        for obs in observations.iter_mut() {
            if obs.vendor.is_none() {
                obs.vendor = obs.mac.as_deref().and_then(|m| self.vendors.lookup(m));
            }
        }
    }
}

/// User-selectable discovery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    Arp,
    #[default]
    Hybrid,
    Conservative,
    Fast,
    Thorough,
}

impl DiscoveryMode {
    pub const ALL: [DiscoveryMode; 5] = [
        Self::Hybrid,
        Self::Arp,
        Self::Fast,
        Self::Thorough,
        Self::Conservative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arp => "arp",
            Self::Hybrid => "hybrid",
            Self::Conservative => "conservative",
            Self::Fast => "fast",
            Self::Thorough => "thorough",
        }
    }

    /// Instantiate the strategy for this mode
    pub fn build(self, ctx: DiscoveryContext) -> Arc<dyn DiscoveryStrategy> {
        match self {
            Self::Arp => Arc::new(ArpStrategy::arp(ctx)),
            Self::Hybrid => Arc::new(ArpStrategy::hybrid(ctx)),
            Self::Conservative => Arc::new(ConservativeStrategy::new(ctx)),
            Self::Fast => Arc::new(FastStrategy::new(ctx)),
            Self::Thorough => Arc::new(ThoroughStrategy::new(ctx)),
        }
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ScanError::InvalidArgument(format!(
                    "unknown mode '{}' (expected hybrid, arp, fast, thorough or conservative)",
                    s
                ))
            })
    }
}
