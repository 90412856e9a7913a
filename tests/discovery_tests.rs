use ipnetwork::Ipv4Network;
use lanwatch::budget::{BudgetLimiter, ThreadBudget};
use lanwatch::config::ScanConfig;
use lanwatch::db::VendorDb;
use lanwatch::discovery::tcp::hosts_in_flight;
use lanwatch::discovery::{DiscoveryContext, DiscoveryMode};
use lanwatch::net::{LocalInterface, LocalNetwork};
use std::str::FromStr;
use std::sync::Arc;
use test_utils::{closed_port, ip, spawn_listener, MockAdapter};
use tokio_util::sync::CancellationToken;

mod test_utils;

fn net(s: &str) -> Ipv4Network {
    s.parse().unwrap()
}

fn context(adapter: MockAdapter, config: ScanConfig, interfaces: Vec<LocalInterface>) -> DiscoveryContext {
    DiscoveryContext {
        config: Arc::new(config),
        adapter: Arc::new(adapter),
        local: Arc::new(LocalNetwork::new(interfaces, None)),
        vendors: Arc::new(VendorDb::in_memory()),
        limits: BudgetLimiter::new(ThreadBudget::from_total(20)),
    }
}

fn lan_interface() -> LocalInterface {
    LocalInterface {
        name: "eth0".into(),
        ip: ip("192.168.1.3"),
        network: net("192.168.1.0/29"),
        mac: Some("3c:97:0e:00:00:03".into()),
    }
}

fn loopback_interface() -> LocalInterface {
    LocalInterface {
        name: "lo".into(),
        ip: ip("127.0.0.1"),
        network: net("127.0.0.1/32"),
        mac: None,
    }
}

fn quick_config() -> ScanConfig {
    ScanConfig {
        ping_timeout_ms: 10,
        arp_settle_ms: 0,
        tcp_connect_timeout_ms: 300,
        ..ScanConfig::default()
    }
}

#[test]
fn test_mode_names() {
    for mode in DiscoveryMode::ALL {
        assert_eq!(DiscoveryMode::from_str(mode.as_str()).unwrap(), mode);
    }
    assert_eq!(DiscoveryMode::from_str(" FAST ").unwrap(), DiscoveryMode::Fast);
    assert_eq!(DiscoveryMode::default(), DiscoveryMode::Hybrid);
    assert!(DiscoveryMode::from_str("stealth").unwrap_err().is_input_error());
}

#[tokio::test]
async fn test_conservative_reports_open_ports() {
    let open = spawn_listener(None).await;
    let closed = closed_port();
    let config = ScanConfig {
        discovery_ports: vec![closed, open],
        ..quick_config()
    };
    let strategy = DiscoveryMode::Conservative.build(context(MockAdapter::default(), config, vec![]));
    assert_eq!(strategy.name(), "conservative");

    let found = strategy.discover(net("127.0.0.1/32"), &CancellationToken::new()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].ip, ip("127.0.0.1"));
    assert!(found[0].online);
    assert_eq!(found[0].open_ports, Some(vec![open]));
    assert!(found[0].rtt.is_some());
}

#[tokio::test]
async fn test_conservative_ignores_refusing_hosts() {
    let config = ScanConfig {
        discovery_ports: vec![closed_port()],
        ..quick_config()
    };
    let strategy = DiscoveryMode::Conservative.build(context(MockAdapter::default(), config, vec![]));
    let found = strategy.discover(net("127.0.0.1/32"), &CancellationToken::new()).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_thorough_keeps_validated_ports() {
    let open = spawn_listener(Some("220 ready\r\n")).await;
    let config = ScanConfig {
        thorough_ports: vec![open, closed_port()],
        ..quick_config()
    };
    let strategy = DiscoveryMode::Thorough.build(context(MockAdapter::default(), config, vec![]));
    let found = strategy.discover(net("127.0.0.1/32"), &CancellationToken::new()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].open_ports, Some(vec![open]));
}

#[tokio::test]
async fn test_cancelled_strategies_return_nothing() {
    let open = spawn_listener(None).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    for mode in DiscoveryMode::ALL {
        let config = ScanConfig {
            discovery_ports: vec![open],
            thorough_ports: vec![open],
            ..quick_config()
        };
        let strategy = mode.build(context(MockAdapter::default(), config, vec![loopback_interface()]));
        let found = strategy.discover(net("127.0.0.1/32"), &cancel).await.unwrap();
        assert!(found.is_empty(), "{mode}");
    }
}

#[tokio::test]
async fn test_arp_reads_neighbour_cache() {
    let adapter = MockAdapter {
        reachable: [ip("192.168.1.2")].into_iter().collect(),
        ..MockAdapter::with_arp(&[
            ("192.168.1.2", "00:17:f2:01:02:03"),
            ("192.168.1.5", "ba:11:22:33:44:55"),
            ("192.168.1.200", "00:17:f2:0a:0b:0c"),
        ])
    };
    let ctx = context(adapter, quick_config(), vec![lan_interface()]);
    let strategy = DiscoveryMode::Arp.build(ctx);

    let found = strategy.discover(net("192.168.1.0/29"), &CancellationToken::new()).await.unwrap();
    let ips: Vec<_> = found.iter().map(|o| o.ip).collect();
    // Outside the target and never our own address in plain ARP mode
    assert_eq!(ips, vec![ip("192.168.1.2"), ip("192.168.1.5")]);
    assert_eq!(found[0].mac.as_deref(), Some("00:17:f2:01:02:03"));
    assert_eq!(found[0].vendor.as_deref(), Some("Apple, Inc."));
    // Locally administered MACs get no vendor
    assert_eq!(found[1].vendor, None);
}

#[tokio::test]
async fn test_hybrid_adds_this_machine() {
    let adapter = MockAdapter::with_arp(&[("192.168.1.1", "00:00:0c:11:22:33")]);
    let ctx = context(adapter, quick_config(), vec![lan_interface()]);
    let strategy = DiscoveryMode::Hybrid.build(ctx);

    let found = strategy.discover(net("192.168.1.0/29"), &CancellationToken::new()).await.unwrap();
    let ips: Vec<_> = found.iter().map(|o| o.ip).collect();
    assert_eq!(ips, vec![ip("192.168.1.1"), ip("192.168.1.3")]);
    assert_eq!(found[1].mac.as_deref(), Some("3c:97:0e:00:00:03"));
    assert_eq!(found[1].vendor.as_deref(), Some("Intel Corporate"));
}

#[tokio::test]
async fn test_hybrid_falls_back_to_tcp_on_empty_cache() {
    let open = spawn_listener(None).await;
    let config = ScanConfig {
        discovery_ports: vec![open],
        ..quick_config()
    };
    let adapter = MockAdapter {
        arp_fails: true,
        ..MockAdapter::default()
    };
    let ctx = context(adapter, config, vec![loopback_interface()]);
    let strategy = DiscoveryMode::Hybrid.build(ctx);

    let found = strategy.discover(net("127.0.0.1/32"), &CancellationToken::new()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].open_ports, Some(vec![open]));
}

#[tokio::test]
async fn test_remote_target_skips_ping_sweep() {
    let open = spawn_listener(None).await;
    let config = ScanConfig {
        discovery_ports: vec![open],
        ..quick_config()
    };
    let adapter = Arc::new(MockAdapter::default());
    let ctx = DiscoveryContext {
        adapter: adapter.clone(),
        ..context(MockAdapter::default(), config, vec![lan_interface()])
    };
    let strategy = DiscoveryMode::Arp.build(ctx);

    let found = strategy.discover(net("127.0.0.1/32"), &CancellationToken::new()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(adapter.pings.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn test_sockets_stay_within_scan_budget() {
    // thorough on a large network: 150 scan slots, 18 ports per host
    assert_eq!(hosts_in_flight(150, 18), 8);
    assert!(hosts_in_flight(150, 18) * 18 <= 150);
    // conservative: 5 ports
    assert_eq!(hosts_in_flight(40, 5), 8);
    // fast connects one port at a time
    assert_eq!(hosts_in_flight(40, 1), 40);
    // always at least one host
    assert_eq!(hosts_in_flight(10, 18), 1);
    assert_eq!(hosts_in_flight(0, 0), 1);
}
