use lanwatch::config::ScanConfig;
use lanwatch::inspect::{parse_port_spec, DnsConsistency, HostInspector, PortToken};
use lanwatch::model::HostnameSource;
use lanwatch::net::PortState;
use std::sync::Arc;
use std::time::Instant;
use test_utils::{closed_port, create_test_device, ip, spawn_listener, MockAdapter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod test_utils;

#[test]
fn test_port_spec_parsing() {
    let tokens = parse_port_spec("icmp,22,80-82,7000").unwrap();
    assert_eq!(
        tokens,
        vec![
            PortToken::Icmp,
            PortToken::Tcp(22),
            PortToken::Tcp(80),
            PortToken::Tcp(81),
            PortToken::Tcp(82),
            PortToken::Tcp(7000),
        ]
    );

    let wide = parse_port_spec("1-1000").unwrap();
    assert_eq!(wide.len(), 101);
    assert_eq!(wide.first(), Some(&PortToken::Tcp(1)));
    assert_eq!(wide.last(), Some(&PortToken::Tcp(101)));

    assert_eq!(parse_port_spec(" ICMP , 443 ").unwrap(), vec![PortToken::Icmp, PortToken::Tcp(443)]);
}

#[test]
fn test_port_spec_rejects_garbage() {
    for bad in ["", ",", "0", "65536", "90-80", "http", "22-"] {
        let err = parse_port_spec(bad).unwrap_err();
        assert!(err.is_input_error(), "{bad:?}");
    }
}

#[test]
fn test_dns_consistency_evaluation() {
    let consistent = DnsConsistency::evaluate(
        "NAS.lan.",
        vec!["other.lan".to_string(), "nas.lan".to_string()],
    );
    assert!(matches!(consistent, DnsConsistency::Consistent { .. }));

    let mismatch = DnsConsistency::evaluate("nas.lan", vec!["printer.lan".to_string()]);
    assert!(matches!(mismatch, DnsConsistency::Mismatch { .. }));
    assert!(mismatch.describe().contains("printer.lan"));

    let missing = DnsConsistency::evaluate("nas.lan", Vec::new());
    assert!(missing.describe().contains("no reverse record"));
}

#[tokio::test]
async fn test_dns_check_only_for_cached_names() {
    let inspector = HostInspector::new(Arc::new(MockAdapter::default()), &ScanConfig::default());
    let mut record = create_test_device("127.0.0.1", Instant::now());
    record.hostname = "box.lan".into();
    record.hostname_source = HostnameSource::Mdns;
    assert_eq!(inspector.dns_consistency(&record).await, DnsConsistency::NotApplicable);
}

#[tokio::test]
async fn test_scan_ports_against_local_listeners() {
    let open = spawn_listener(Some("SSH-2.0-OpenSSH_9.6 Ubuntu-3ubuntu13\r\n")).await;
    let silent = spawn_listener(None).await;
    let closed = closed_port();
    let adapter = MockAdapter {
        reachable: [ip("127.0.0.1")].into_iter().collect(),
        ..MockAdapter::default()
    };
    let mut config = ScanConfig::default();
    config.banner_read_timeout_ms = 100;
    let inspector = HostInspector::new(Arc::new(adapter), &config);

    let tokens = vec![
        PortToken::Tcp(closed),
        PortToken::Tcp(open),
        PortToken::Icmp,
        PortToken::Tcp(silent),
    ];
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let results = inspector.scan_ports(ip("127.0.0.1"), &tokens, Some(tx), &cancel).await;

    let mut streamed = 0;
    while rx.recv().await.is_some() {
        streamed += 1;
    }
    assert_eq!(streamed, 4);

    // Final order: open before closed, input order within a state
    let order: Vec<_> = results.iter().map(|r| (r.token, r.state)).collect();
    assert_eq!(
        order,
        vec![
            (PortToken::Tcp(open), PortState::Open),
            (PortToken::Icmp, PortState::Open),
            (PortToken::Tcp(silent), PortState::Open),
            (PortToken::Tcp(closed), PortState::Closed),
        ]
    );
    let banner = results[0].banner.as_deref().unwrap();
    assert!(banner.starts_with("SSH-2.0-OpenSSH"));
    assert!(banner.chars().count() <= 30);
    assert_eq!(results[1].service, "icmp");
    assert_eq!(results[2].banner, None);
}

#[tokio::test]
async fn test_cancelled_inspection_returns_nothing() {
    let inspector = HostInspector::new(Arc::new(MockAdapter::default()), &ScanConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let results = inspector
        .scan_ports(ip("127.0.0.1"), &[PortToken::Icmp, PortToken::Tcp(1)], None, &cancel)
        .await;
    assert!(results.is_empty());
}
