//! Concurrency caps for probing and name resolution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency caps derived once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadBudget {
    /// Discovery probes running at once
    pub scan: usize,
    /// Mid-interval reachability probes
    pub reachability: usize,
    /// Hostname resolver workers
    pub dns: usize,
}

impl ThreadBudget {
    /// Defaults scaled to the number of hosts in the target network
    pub fn for_host_count(hosts: u64) -> Self {
        let (scan, reachability, dns) = match hosts {
            0..=16 => (10, 10, 5),
            17..=64 => (20, 20, 8),
            65..=256 => (40, 30, 10),
            257..=1024 => (80, 50, 15),
            _ => (150, 80, 20),
        };
        Self {
            scan,
            reachability,
            dns,
        }
    }

    /// Split a user-supplied total 50/30/20, never below one slot each
    pub fn from_total(total: usize) -> Self {
        Self {
            scan: (total * 50 / 100).max(1),
            reachability: (total * 30 / 100).max(1),
            dns: (total * 20 / 100).max(1),
        }
    }

    pub fn resolve(hosts: u64, override_total: Option<usize>) -> Self {
        match override_total {
            Some(total) if total > 0 => Self::from_total(total),
            _ => Self::for_host_count(hosts),
        }
    }

    pub fn total(&self) -> usize {
        self.scan + self.reachability + self.dns
    }
}

/// Runtime enforcement of a `ThreadBudget`: one counting semaphore per cap
/// and a counter of resolver workers currently running.
#[derive(Debug, Clone)]
pub struct BudgetLimiter {
    budget: ThreadBudget,
    scan: Arc<Semaphore>,
    reachability: Arc<Semaphore>,
    dns: Arc<Semaphore>,
    active_resolvers: Arc<AtomicUsize>,
}

impl BudgetLimiter {
    pub fn new(budget: ThreadBudget) -> Self {
        Self {
            budget,
            scan: Arc::new(Semaphore::new(budget.scan)),
            reachability: Arc::new(Semaphore::new(budget.reachability)),
            dns: Arc::new(Semaphore::new(budget.dns)),
            active_resolvers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn budget(&self) -> ThreadBudget {
        self.budget
    }

    /// `None` only if the semaphore was closed
    pub async fn scan_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.scan.clone().acquire_owned().await.ok()
    }

    pub async fn reachability_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.reachability.clone().acquire_owned().await.ok()
    }

    /// A dns slot plus an active-resolver registration, both released on drop
    pub async fn resolver_slot(&self) -> Option<ResolverSlot> {
        let permit = self.dns.clone().acquire_owned().await.ok()?;
        self.active_resolvers.fetch_add(1, Ordering::SeqCst);
        Some(ResolverSlot {
            _permit: permit,
            active: self.active_resolvers.clone(),
        })
    }

    /// Resolver workers currently holding a slot
    pub fn active_resolvers(&self) -> usize {
        self.active_resolvers.load(Ordering::SeqCst)
    }
}

/// Held by a running resolver worker
#[derive(Debug)]
pub struct ResolverSlot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for ResolverSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
