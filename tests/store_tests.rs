use lanwatch::model::{DeviceStatus, HostObservation, HostnameSource};
use lanwatch::store::DeviceStore;
use std::time::{Duration, Instant};
use test_utils::{ip, observation};

mod test_utils;

const MAC: &str = "aa:bb:cc:dd:ee:ff";

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn test_new_device_appearance() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(&[observation("192.168.1.5", Some(MAC))], 1, t0);

    let d = store.get(ip("192.168.1.5")).unwrap();
    assert_eq!(d.status, DeviceStatus::Online);
    assert_eq!(d.first_seen, t0);
    assert_eq!(d.first_seen_scan, 1);
    assert_eq!(d.status_since, t0);
    assert_eq!(d.last_seen, t0);
    assert_eq!(d.flaps, 0);
    assert_eq!(d.uptime(t0), Duration::ZERO);
    assert_eq!(d.mac.as_deref(), Some(MAC));
}

#[test]
fn test_offline_transition_and_recovery() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(&[observation("192.168.1.5", Some(MAC))], 1, t0);

    // Empty scan at t=60 flips the device offline
    store.merge(&[], 2, t0 + secs(60));
    let d = store.get(ip("192.168.1.5")).unwrap();
    assert_eq!(d.status, DeviceStatus::Offline);
    assert_eq!(d.status_since, t0 + secs(60));
    assert_eq!(d.flaps, 1);
    assert_eq!(d.downtime(t0 + secs(60)), Duration::ZERO);
    assert_eq!(d.uptime(t0 + secs(60)), secs(60));
    // Uptime stays frozen while offline
    assert_eq!(d.uptime(t0 + secs(90)), secs(60));
    assert_eq!(d.downtime(t0 + secs(90)), secs(30));

    // Back online at t=120
    store.merge(&[observation("192.168.1.5", Some(MAC))], 3, t0 + secs(120));
    let d = store.get(ip("192.168.1.5")).unwrap();
    assert_eq!(d.status, DeviceStatus::Online);
    assert_eq!(d.flaps, 2);
    assert_eq!(d.offline_total, secs(60));
    assert_eq!(d.uptime(t0 + secs(120)), secs(60));
    assert_eq!(d.first_seen_scan, 1);
}

#[test]
fn test_empty_scan_flips_every_online_device() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(
        &[
            observation("10.0.0.1", None),
            observation("10.0.0.2", None),
            observation("10.0.0.3", None),
        ],
        1,
        t0,
    );
    store.merge(&[], 2, t0 + secs(5));
    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.online_count(), 0);
    assert!(snapshot.devices.iter().all(|d| d.flaps == 1));
}

#[test]
fn test_last_observation_wins() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    let first = observation("10.0.0.7", Some("00:11:22:33:44:55"));
    let second = observation("10.0.0.7", Some("66:77:88:99:aa:bb"));
    store.merge(&[first, second], 1, t0);
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.get(ip("10.0.0.7")).unwrap().mac.as_deref(),
        Some("66:77:88:99:aa:bb")
    );
}

#[test]
fn test_merge_keeps_rtt_and_hostname() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    let measured = observation("10.0.0.9", None).with_rtt(Duration::from_millis(4));
    store.merge(&[measured], 1, t0);
    store.update(ip("10.0.0.9"), |d| {
        d.hostname = "printer.lan".into();
        d.hostname_source = HostnameSource::Mdns;
    });

    let zero_rtt = observation("10.0.0.9", None).with_rtt(Duration::ZERO);
    store.merge(&[zero_rtt], 2, t0 + secs(60));
    let d = store.get(ip("10.0.0.9")).unwrap();
    assert_eq!(d.rtt, Some(Duration::from_millis(4)));
    assert_eq!(d.hostname, "printer.lan");
    assert_eq!(d.hostname_source, HostnameSource::Mdns);
    assert_eq!(d.last_seen, t0 + secs(60));
}

#[test]
fn test_ports_replaced_only_when_measured() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(&[observation("10.0.0.4", None).with_ports(vec![22, 80])], 1, t0);
    store.merge(&[observation("10.0.0.4", None)], 2, t0 + secs(1));
    assert_eq!(store.get(ip("10.0.0.4")).unwrap().open_ports, vec![22, 80]);
    store.merge(&[observation("10.0.0.4", None).with_ports(vec![443])], 3, t0 + secs(2));
    assert_eq!(store.get(ip("10.0.0.4")).unwrap().open_ports, vec![443]);
}

#[test]
fn test_offline_observation_does_not_count_as_seen() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(&[observation("10.0.0.8", None)], 1, t0);
    let mut gone = HostObservation::online(ip("10.0.0.8"));
    gone.online = false;
    store.merge(&[gone], 2, t0 + secs(10));
    assert_eq!(store.get(ip("10.0.0.8")).unwrap().status, DeviceStatus::Offline);
}

#[test]
fn test_touch_updates_online_devices_only() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(&[observation("10.0.0.1", None), observation("10.0.0.2", None)], 1, t0);
    store.merge(&[observation("10.0.0.1", None)], 2, t0 + secs(60));

    assert!(store.touch(ip("10.0.0.1"), Duration::from_millis(2), t0 + secs(65)));
    assert!(!store.touch(ip("10.0.0.2"), Duration::from_millis(2), t0 + secs(65)));
    let up = store.get(ip("10.0.0.1")).unwrap();
    assert_eq!(up.last_seen, t0 + secs(65));
    assert_eq!(up.rtt, Some(Duration::from_millis(2)));
    assert_eq!(up.flaps, 0);
    assert_eq!(store.get(ip("10.0.0.2")).unwrap().last_seen, t0);
}

#[test]
fn test_gateway_flag() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(&[observation("10.0.0.1", None), observation("10.0.0.2", None)], 1, t0);
    store.set_gateway(Some(ip("10.0.0.1")));
    let snapshot = store.snapshot();
    assert!(snapshot.get(ip("10.0.0.1")).unwrap().is_gateway);
    assert!(!snapshot.get(ip("10.0.0.2")).unwrap().is_gateway);
}

/// Pseudo-random presence pattern: host `h` is up in scan `s` when this is true
fn present(h: u8, s: u64) -> bool {
    (u64::from(h) * 7 + s * 13 + (s * u64::from(h)) % 5) % 3 != 0
}

#[test]
fn test_presence_invariants_over_many_scans() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    let mut flaps = std::collections::HashMap::new();

    for s in 1..=40u64 {
        let reference = t0 + secs(s * 30);
        let observations: Vec<_> = (1..=12u8)
            .filter(|h| present(*h, s))
            .map(|h| HostObservation::online(std::net::Ipv4Addr::new(10, 0, 0, h)))
            .collect();
        store.merge(&observations, s, reference);

        for d in store.snapshot().devices {
            let previous = flaps.insert(d.ip, d.flaps).unwrap_or(0);
            assert!(d.flaps >= previous, "flaps went backwards for {}", d.ip);
            assert!(d.status_since >= d.first_seen);
            assert!(d.last_seen <= reference);
            if d.is_online() {
                assert!(d.status_since <= d.last_seen);
                assert_eq!(d.last_seen, reference);
                assert_eq!(
                    d.uptime(reference) + d.offline_total,
                    reference - d.first_seen,
                    "uptime accounting broken for {}",
                    d.ip
                );
            }
        }
    }
}

#[test]
fn test_merge_is_idempotent() {
    let t0 = Instant::now();
    let store = DeviceStore::new();
    store.merge(&[observation("10.0.0.1", Some(MAC)), observation("10.0.0.2", None)], 1, t0);
    store.merge(&[observation("10.0.0.2", None)], 2, t0 + secs(30));
    let batch = [observation("10.0.0.1", Some(MAC))];

    store.merge(&batch, 3, t0 + secs(60));
    let once = store.snapshot();
    store.merge(&batch, 3, t0 + secs(60));
    let twice = store.snapshot();
    assert_eq!(once.devices, twice.devices);
}
