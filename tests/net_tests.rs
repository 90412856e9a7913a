use ipnetwork::Ipv4Network;
use lanwatch::budget::{BudgetLimiter, ThreadBudget};
use lanwatch::net::mac::normalize_mac;
use lanwatch::net::ping::parallel_ping_sweep;
use lanwatch::net::{host_addresses, host_count, parse_cidr};
use std::net::Ipv4Addr;
use std::time::Duration;
use test_utils::{ip, MockAdapter};
use tokio_util::sync::CancellationToken;

mod test_utils;

#[test]
fn test_host_count_for_every_mask() {
    for mask in 0..=32u8 {
        let network = Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), mask).unwrap();
        let expected = match mask {
            32 => 1,
            31 => 2,
            m => (1u64 << (32 - u32::from(m))) - 2,
        };
        assert_eq!(host_count(network), expected, "/{mask}");
    }
}

#[test]
fn test_generated_addresses_match_count() {
    // Small enough to enumerate in a test
    for mask in 20..=32u8 {
        let network = Ipv4Network::new(Ipv4Addr::new(192, 168, 16, 0), mask).unwrap();
        let hosts: Vec<_> = host_addresses(network).collect();
        assert_eq!(hosts.len() as u64, host_count(network), "/{mask}");
        assert!(hosts.windows(2).all(|w| w[0] < w[1]));
        if mask <= 30 {
            assert!(!hosts.contains(&network.network()));
            assert!(!hosts.contains(&network.broadcast()));
        }
    }
}

#[test]
fn test_parse_cidr() {
    assert_eq!(parse_cidr("192.168.1.77/24").unwrap().to_string(), "192.168.1.0/24");
    assert_eq!(parse_cidr(" 10.1.2.3 ").unwrap().to_string(), "10.1.2.3/32");
    for bad in ["192.168.1.0/33", "300.1.1.1/24", "not-a-network", ""] {
        let err = parse_cidr(bad).unwrap_err();
        assert!(err.is_input_error(), "{bad}");
    }
}

#[test]
fn test_mac_normalization_forms() {
    let octets = [
        [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
        [0x00, 0x1b, 0x63, 0x0a, 0x01, 0xf0],
        [0x3c, 0x07, 0x54, 0x00, 0x00, 0x01],
    ];
    for o in octets {
        let canonical = o.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":");
        let windows = o.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join("-");
        let unix = canonical.to_uppercase();
        let short = o.iter().map(|b| format!("{b:x}")).collect::<Vec<_>>().join(":");
        for form in [&canonical, &windows, &unix, &short] {
            assert_eq!(normalize_mac(form).as_deref(), Some(canonical.as_str()), "{form}");
        }
    }
    assert_eq!(normalize_mac("aa:bb:cc:dd:ee"), None);
    assert_eq!(normalize_mac("aa:bb:cc:dd:ee:fg"), None);
    assert_eq!(normalize_mac("aaa:bb:cc:dd:ee:ff"), None);
}

#[test]
fn test_budget_tiers_and_split() {
    assert_eq!(ThreadBudget::for_host_count(14), ThreadBudget { scan: 10, reachability: 10, dns: 5 });
    assert_eq!(ThreadBudget::for_host_count(62), ThreadBudget { scan: 20, reachability: 20, dns: 8 });
    assert_eq!(ThreadBudget::for_host_count(254), ThreadBudget { scan: 40, reachability: 30, dns: 10 });
    assert_eq!(ThreadBudget::for_host_count(1022), ThreadBudget { scan: 80, reachability: 50, dns: 15 });
    assert_eq!(ThreadBudget::for_host_count(65534), ThreadBudget { scan: 150, reachability: 80, dns: 20 });

    assert_eq!(ThreadBudget::from_total(100), ThreadBudget { scan: 50, reachability: 30, dns: 20 });
    assert_eq!(ThreadBudget::from_total(1), ThreadBudget { scan: 1, reachability: 1, dns: 1 });
    assert_eq!(ThreadBudget::resolve(254, Some(0)), ThreadBudget::for_host_count(254));
}

#[tokio::test]
async fn test_resolver_slots_are_counted() {
    let limits = BudgetLimiter::new(ThreadBudget { scan: 1, reachability: 1, dns: 2 });
    assert_eq!(limits.active_resolvers(), 0);
    let a = limits.resolver_slot().await.unwrap();
    let b = limits.resolver_slot().await.unwrap();
    assert_eq!(limits.active_resolvers(), 2);

    // A third slot waits until one is released
    let waiting = tokio::time::timeout(Duration::from_millis(20), limits.resolver_slot()).await;
    assert!(waiting.is_err());
    drop(a);
    assert_eq!(limits.active_resolvers(), 1);
    let c = limits.resolver_slot().await.unwrap();
    assert_eq!(limits.active_resolvers(), 2);
    drop((b, c));
    assert_eq!(limits.active_resolvers(), 0);
}

#[tokio::test]
async fn test_ping_sweep_returns_answering_hosts() {
    let adapter = MockAdapter {
        reachable: [ip("10.0.0.2"), ip("10.0.0.5")].into_iter().collect(),
        ..MockAdapter::default()
    };
    let hosts: Vec<_> = host_addresses("10.0.0.0/29".parse().unwrap()).collect();
    let limits = BudgetLimiter::new(ThreadBudget::from_total(10));
    let cancel = CancellationToken::new();

    let mut alive = parallel_ping_sweep(&adapter, &hosts, Duration::from_millis(10), &limits, &cancel).await;
    alive.sort();
    assert_eq!(alive, vec![ip("10.0.0.2"), ip("10.0.0.5")]);

    cancel.cancel();
    let none = parallel_ping_sweep(&adapter, &hosts, Duration::from_millis(10), &limits, &cancel).await;
    assert!(none.is_empty());
}
