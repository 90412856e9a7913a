//! Kernel ARP table parsing.

use super::mac::{is_usable_host_mac, normalize_mac};
use crate::model::HostObservation;
use ipnetwork::Ipv4Network;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// One resolved IP-to-MAC pair from the kernel neighbour cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: String,
}

/// Parse any of the common ARP listings into entries.
///
/// Understands `/proc/net/arp`, BSD/macOS `arp -an`, Windows `arp -a` and
/// `ip neigh`. Incomplete entries and multicast/broadcast MACs are dropped.
pub fn parse_arp_table(listing: &str) -> Vec<ArpEntry> {
    listing.lines().filter_map(parse_arp_line).collect()
}

fn parse_arp_line(line: &str) -> Option<ArpEntry> {
    let lower = line.to_ascii_lowercase();
    if lower.contains("incomplete") || lower.contains("failed") {
        return None;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();

    // /proc/net/arp: "IP  HW-type  Flags  HW-address  Mask  Device", flags 0x0 = incomplete
    if tokens.len() >= 6 && tokens[2].starts_with("0x") && tokens[2] == "0x0" {
        return None;
    }

    let ip = tokens.iter().find_map(|t| {
        let t = t.trim_matches(|c| c == '(' || c == ')');
        Ipv4Addr::from_str(t).ok()
    })?;
    let mac = tokens.iter().find_map(|t| {
        if t.contains(':') || t.contains('-') {
            normalize_mac(t)
        } else {
            None
        }
    })?;

    if !is_usable_host_mac(&mac) {
        return None;
    }
    Some(ArpEntry { ip, mac })
}

/// ARP entries inside `network` as online observations, one per IP
pub fn observations_in(network: Ipv4Network, entries: &[ArpEntry]) -> Vec<HostObservation> {
    let mut by_ip = BTreeMap::new();
    for entry in entries.iter().filter(|e| network.contains(e.ip)) {
        by_ip.insert(entry.ip, entry.mac.clone());
    }
    by_ip
        .into_iter()
        .map(|(ip, mac)| HostObservation::online(ip).with_mac(mac))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proc_net_arp() {
        let listing = "IP address       HW type     Flags       HW address            Mask     Device\n\
                       192.168.1.1      0x1         0x2         a4:2b:b0:11:22:33     *        eth0\n\
                       192.168.1.9      0x1         0x0         00:00:00:00:00:00     *        eth0\n";
        let entries = parse_arp_table(listing);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(entries[0].mac, "a4:2b:b0:11:22:33");
    }

    #[test]
    fn parses_bsd_short_octets() {
        let listing = "? (192.168.1.20) at 0:1b:63:a:b:c on en0 ifscope [ethernet]\n\
                       ? (192.168.1.21) at (incomplete) on en0 ifscope [ethernet]\n\
                       ? (224.0.0.251) at 1:0:5e:0:0:fb on en0 ifscope permanent [ethernet]\n";
        let entries = parse_arp_table(listing);
        assert_eq!(entries, vec![ArpEntry {
            ip: Ipv4Addr::new(192, 168, 1, 20),
            mac: "00:1b:63:0a:0b:0c".to_string(),
        }]);
    }

    #[test]
    fn parses_windows_listing() {
        let listing = "Interface: 192.168.1.50 --- 0x4\n  Internet Address      Physical Address      Type\n  \
                       192.168.1.1           a4-2b-b0-11-22-33     dynamic\n  \
                       192.168.1.255         ff-ff-ff-ff-ff-ff     static\n";
        let entries = parse_arp_table(listing);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mac, "a4:2b:b0:11:22:33");
    }

    #[test]
    fn parses_ip_neigh() {
        let listing = "192.168.1.7 dev wlan0 lladdr 3c:22:fb:01:02:03 REACHABLE\n\
                       192.168.1.8 dev wlan0  FAILED\n";
        let entries = parse_arp_table(listing);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, Ipv4Addr::new(192, 168, 1, 7));
    }
}
