use lanwatch::model::{DeviceType, HostnameSource};
use lanwatch::output::{render_table, write_csv, write_json};
use std::time::{Duration, Instant};
use test_utils::create_test_device;

mod test_utils;

fn sample() -> Vec<lanwatch::model::DeviceRecord> {
    let now = Instant::now();
    let mut printer = create_test_device("192.168.1.20", now);
    printer.hostname = "printer.lan".to_string();
    printer.hostname_source = HostnameSource::Dns;
    printer.mac = Some("00:17:f2:aa:bb:cc".to_string());
    printer.vendor = Some("Apple, Inc.".to_string());
    printer.device_type = DeviceType::Printer;
    printer.rtt = Some(Duration::from_micros(1500));
    printer.open_ports = vec![80, 631];

    let bare = create_test_device("192.168.1.21", now);
    vec![printer, bare]
}

#[test]
fn test_json_output() {
    let mut out = Vec::new();
    write_json(&sample(), &mut out).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let rows = value.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0]["ip"], "192.168.1.20");
    assert_eq!(rows[0]["hostname_source"], "dns");
    assert_eq!(rows[0]["device_type"], "Printer");
    assert_eq!(rows[0]["rtt"], 1_500_000);
    assert_eq!(rows[0]["ports"], serde_json::json!([80, 631]));
    assert_eq!(rows[0]["online"], true);

    assert!(rows[1].get("rtt").is_none());
    assert_eq!(rows[1]["mac"], serde_json::Value::Null);
}

#[test]
fn test_csv_output() {
    let mut out = Vec::new();
    write_csv(&sample(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "IP,Hostname,RTT,MAC,Vendor,DeviceType,Ports");
    assert_eq!(
        lines[1],
        "192.168.1.20,printer.lan,1.5ms,00:17:f2:aa:bb:cc,\"Apple, Inc.\",Printer,80;631"
    );
    assert_eq!(lines[2], "192.168.1.21,,,,,Unknown,");
}

#[test]
fn test_table_columns_follow_width() {
    let devices = sample();
    let narrow = render_table(&devices, 80).to_string();
    assert!(!narrow.contains("Vendor"));
    assert!(!narrow.contains("00:17:f2"));

    let medium = render_table(&devices, 120).to_string();
    assert!(medium.contains("00:17:f2:aa:bb:cc"));
    assert!(!medium.contains("Vendor"));

    let wide = render_table(&devices, 180).to_string();
    assert!(wide.contains("Vendor"));
    assert!(wide.contains("printer.lan (dns)"));
}
