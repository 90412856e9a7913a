//! Device-state store: one lifecycle record per IPv4 address seen this run.

use crate::detect::classify::classify_record;
use crate::model::{DeviceRecord, DeviceStatus, HostObservation};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Immutable copy of the store, safe to read without locking
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Ordinal of the last merged scan, 0 before the first one
    pub scan: u64,
    pub taken_at: Instant,
    /// Sorted by IP
    pub devices: Vec<DeviceRecord>,
}

impl StoreSnapshot {
    pub fn empty(taken_at: Instant) -> Self {
        Self {
            scan: 0,
            taken_at,
            devices: Vec::new(),
        }
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<&DeviceRecord> {
        self.devices
            .binary_search_by_key(&ip, |d| d.ip)
            .ok()
            .map(|i| &self.devices[i])
    }

    pub fn online_count(&self) -> usize {
        self.devices.iter().filter(|d| d.is_online()).count()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    scan: u64,
    devices: BTreeMap<Ipv4Addr, DeviceRecord>,
}

/// Keyed map from IP to device record behind one readers-writer lock.
/// Records are created on first observation and never removed.
#[derive(Debug, Default)]
pub struct DeviceStore {
    inner: RwLock<Inner>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fold one scan's observations into the store.
    ///
    /// Every state change uses `reference`. When an address is observed
    /// more than once the last observation wins. Online records that were
    /// not observed go offline.
    pub fn merge(&self, observations: &[HostObservation], scan: u64, reference: Instant) {
        let mut latest: BTreeMap<Ipv4Addr, &HostObservation> = BTreeMap::new();
        for obs in observations {
            latest.insert(obs.ip, obs);
        }
        let observed: BTreeSet<Ipv4Addr> = latest
            .iter()
            .filter(|(_, obs)| obs.online)
            .map(|(ip, _)| *ip)
            .collect();

        let mut inner = self.write();
        inner.scan = inner.scan.max(scan);

        for ip in &observed {
            let obs = latest[ip];
            let record = inner.devices.entry(*ip).or_insert_with(|| {
                debug!(%ip, scan, "new device");
                DeviceRecord::new(*ip, scan, reference)
            });
            if record.status == DeviceStatus::Offline {
                debug!(%ip, "device back online");
                record.transition(DeviceStatus::Online, reference);
            }
            record.last_seen = record.last_seen.max(reference);
            overlay(record, obs);
        }

        for record in inner.devices.values_mut() {
            if record.is_online() && !observed.contains(&record.ip) {
                debug!(ip = %record.ip, "device went offline");
                record.transition(DeviceStatus::Offline, reference);
            }
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, taken_at: Instant) -> StoreSnapshot {
        let inner = self.read();
        StoreSnapshot {
            scan: inner.scan,
            taken_at,
            devices: inner.devices.values().cloned().collect(),
        }
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<DeviceRecord> {
        self.read().devices.get(&ip).cloned()
    }

    /// Apply `f` to the record for `ip`; false when there is none
    pub fn update<F>(&self, ip: Ipv4Addr, f: F) -> bool
    where
        F: FnOnce(&mut DeviceRecord),
    {
        match self.write().devices.get_mut(&ip) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every record
    pub fn update_all<F>(&self, mut f: F)
    where
        F: FnMut(&mut DeviceRecord),
    {
        for record in self.write().devices.values_mut() {
            f(record);
        }
    }

    /// Flag exactly the record at `gateway` as the default gateway
    pub fn set_gateway(&self, gateway: Option<Ipv4Addr>) {
        for record in self.write().devices.values_mut() {
            record.is_gateway = Some(record.ip) == gateway;
        }
    }

    /// Reachability refresh result: new RTT and last-seen, never a status change
    /// Returns false when `ip` is unknown or offline.
    pub fn touch(&self, ip: Ipv4Addr, rtt: Duration, reference: Instant) -> bool {
        let mut touched = false;
        self.update(ip, |record| {
            if !record.is_online() {
                return;
            }
            if !rtt.is_zero() {
                record.rtt = Some(rtt);
            }
            record.last_seen = record.last_seen.max(reference);
            touched = true;
        });
        touched
    }

    pub fn online_ips(&self) -> Vec<Ipv4Addr> {
        self.read()
            .devices
            .values()
            .filter(|d| d.is_online())
            .map(|d| d.ip)
            .collect()
    }

    /// Ordinal of the last merged scan
    pub fn scan(&self) -> u64 {
        self.read().scan
    }

    pub fn len(&self) -> usize {
        self.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().devices.is_empty()
    }
}

/// Copy freshly measured fields over the record. Absent or zero values keep
/// what the record already had; the hostname is never touched here.
fn overlay(record: &mut DeviceRecord, obs: &HostObservation) {
    if let Some(mac) = &obs.mac {
        record.mac = Some(mac.clone());
    }
    if let Some(vendor) = &obs.vendor {
        record.vendor = Some(vendor.clone());
    }
    if let Some(rtt) = obs.rtt.filter(|r| !r.is_zero()) {
        record.rtt = Some(rtt);
    }
    if let Some(ports) = &obs.open_ports {
        record.open_ports = ports.clone();
    }
    if let Some(banner) = &obs.http_banner {
        record.http_banner = Some(banner.clone());
    }
    record.device_type = obs.device_type.unwrap_or_else(|| classify_record(record));
}
