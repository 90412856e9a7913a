//! Periodic scan driver for watch mode.

use crate::budget::BudgetLimiter;
use crate::constants::REFRESH_STEP;
use crate::discovery::DiscoveryStrategy;
use crate::net::tcp_connect;
use crate::resolver::HostnameResolver;
use crate::store::{DeviceStore, StoreSnapshot};
use futures::stream::{self, StreamExt};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Port tried by the reachability refresh when a device has no known open port
const REFRESH_FALLBACK_PORT: u16 = 80;

/// Monotonic time from the runtime clock, so paused-time tests see it move
pub fn clock() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Notifications from the scheduler to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    ScanStarted { scan: u64 },
    ScanFinished {
        scan: u64,
        online: usize,
        total: usize,
        elapsed: Duration,
    },
    ReachabilityRefreshed { probed: usize, answered: usize },
    HostnamesResolved { resolved: usize },
    Notice(String),
}

/// What the UI holds on to while the scheduler runs
pub struct SchedulerHandle {
    pub snapshots: watch::Receiver<Arc<StoreSnapshot>>,
    pub events: mpsc::Receiver<ScanEvent>,
}

/// Static settings for a scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub network: Ipv4Network,
    pub interval: Duration,
    pub gateway: Option<Ipv4Addr>,
    /// Connect timeout for the mid-interval reachability probe
    pub refresh_timeout: Duration,
}

pub struct ScanScheduler {
    config: SchedulerConfig,
    strategy: Arc<dyn DiscoveryStrategy>,
    store: Arc<DeviceStore>,
    resolver: HostnameResolver,
    limits: BudgetLimiter,
    cancel: CancellationToken,
    snapshots: Arc<watch::Sender<Arc<StoreSnapshot>>>,
    events: mpsc::Sender<ScanEvent>,
    scan: u64,
    background: Option<JoinHandle<()>>,
}

impl ScanScheduler {
    pub fn new(
        config: SchedulerConfig,
        strategy: Arc<dyn DiscoveryStrategy>,
        store: Arc<DeviceStore>,
        resolver: HostnameResolver,
        limits: BudgetLimiter,
        cancel: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (snap_tx, snap_rx) = watch::channel(Arc::new(store.snapshot_at(clock())));
        let (event_tx, event_rx) = mpsc::channel(64);
        let scheduler = Self {
            config,
            strategy,
            store,
            resolver,
            limits,
            cancel,
            snapshots: Arc::new(snap_tx),
            events: event_tx,
            scan: 0,
            background: None,
        };
        let handle = SchedulerHandle {
            snapshots: snap_rx,
            events: event_rx,
        };
        (scheduler, handle)
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Scan on every tick until cancelled
    pub async fn run(mut self) {
        info!(
            network = %self.config.network,
            strategy = self.strategy.name(),
            interval_s = self.config.interval.as_secs(),
            "monitor started"
        );
        while !self.cancel.is_cancelled() {
            let tick = tokio::time::Instant::now();
            if !self.run_once().await {
                break;
            }
            self.wait_for_next_tick(tick + self.config.interval).await;
        }
        if let Some(handle) = self.background.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
        }
        info!("monitor stopped");
    }

    /// One full cycle. Returns false when cancellation cut the scan short.
    pub async fn run_once(&mut self) -> bool {
        let scan_start = clock();
        let scan = self.scan + 1;
        self.emit(ScanEvent::ScanStarted { scan });

        let observations = match self
            .strategy
            .discover(self.config.network, &self.cancel)
            .await
        {
            Ok(observations) => observations,
            Err(e) => {
                warn!(error = %e, "discovery failed");
                self.emit(ScanEvent::Notice(format!("scan failed: {}", e)));
                return !self.cancel.is_cancelled();
            }
        };
        if self.cancel.is_cancelled() {
            return false;
        }

        self.scan = scan;
        self.store.merge(&observations, scan, scan_start);
        self.store.set_gateway(self.config.gateway);
        self.resolver.prime_from_cache().await;
        self.publish();

        let resolved = self.resolver.initial_pass(scan_start, &self.cancel).await;
        if resolved > 0 {
            self.publish();
        }

        let snapshot = self.snapshots.borrow().clone();
        let elapsed = clock().saturating_duration_since(scan_start);
        info!(
            scan,
            online = snapshot.online_count(),
            total = snapshot.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan finished"
        );
        self.emit(ScanEvent::ScanFinished {
            scan,
            online: snapshot.online_count(),
            total: snapshot.len(),
            elapsed,
        });

        self.spawn_background();
        true
    }

    /// Background resolution bounded by the interval; at most one in flight
    fn spawn_background(&mut self) {
        if self.background.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("background resolution still running");
            return;
        }
        let resolver = self.resolver.clone();
        let cancel = self.cancel.clone();
        let store = self.store.clone();
        let snapshots = self.snapshots.clone();
        let events = self.events.clone();
        let limit = self.config.interval;
        self.background = Some(tokio::spawn(async move {
            let pass = resolver.background_pass(clock(), &cancel);
            let resolved = tokio::time::timeout(limit, pass).await.unwrap_or(0);
            if resolved > 0 {
                snapshots.send_replace(Arc::new(store.snapshot_at(clock())));
                let _ = events.try_send(ScanEvent::HostnamesResolved { resolved });
            }
        }));
    }

    /// Alternate reachability and UI refreshes every step until `deadline`
    async fn wait_for_next_tick(&self, deadline: tokio::time::Instant) {
        let mut reachability_turn = true;
        loop {
            let step = (tokio::time::Instant::now() + REFRESH_STEP).min(deadline);
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(step) => {}
            }
            if step >= deadline {
                return;
            }
            if reachability_turn {
                self.refresh_reachability().await;
            } else {
                self.publish();
            }
            reachability_turn = !reachability_turn;
        }
    }

    /// One connect per online device; updates RTT and last-seen only
    pub async fn refresh_reachability(&self) {
        let targets: Vec<(Ipv4Addr, u16)> = self
            .store
            .snapshot_at(clock())
            .devices
            .iter()
            .filter(|d| d.is_online())
            .map(|d| (d.ip, d.open_ports.first().copied().unwrap_or(REFRESH_FALLBACK_PORT)))
            .collect();
        if targets.is_empty() {
            return;
        }
        let probed = targets.len();
        let cap = self.limits.budget().reachability.max(1);
        let wait = self.config.refresh_timeout;
        let cancel = &self.cancel;
        let limits = &self.limits;
        let store = &self.store;

        let answered = stream::iter(targets)
            .map(|(ip, port)| async move {
                if cancel.is_cancelled() {
                    return false;
                }
                let Some(_permit) = limits.reachability_permit().await else {
                    return false;
                };
                let result = tcp_connect(ip, port, wait).await;
                if result.connected() {
                    store.touch(ip, result.elapsed, clock());
                }
                result.connected()
            })
            .buffer_unordered(cap)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;
        debug!(probed, answered, "reachability refresh");
        self.emit(ScanEvent::ReachabilityRefreshed { probed, answered });
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(Arc::new(self.store.snapshot_at(clock())));
    }

    fn emit(&self, event: ScanEvent) {
        if self.events.try_send(event).is_err() {
            debug!("event queue full or closed");
        }
    }
}
