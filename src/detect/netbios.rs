//! NetBIOS Name Service node status (NBSTAT) queries, RFC 1002.

use super::wire::{next_query_id, read_name};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const NBSTAT: u16 = 0x0021;
const NETBIOS_NS_PORT: u16 = 137;
/// Group-name bit in the per-name flags word
const GROUP_FLAG: u16 = 0x8000;

/// Node status request for the wildcard name `*`
pub fn build_nbstat_query(id: u16) -> Vec<u8> {
    let mut query = Vec::with_capacity(50);
    query.extend_from_slice(&id.to_be_bytes());
    query.extend_from_slice(&[0x00, 0x00]); // flags: query
    query.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
    query.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    // "*" padded with NULs to 16 bytes, first-level encoded to 32 bytes
    query.push(32);
    let mut name = [0u8; 16];
    name[0] = b'*';
    for b in name {
        query.push(((b >> 4) & 0x0F) + b'A');
        query.push((b & 0x0F) + b'A');
    }
    query.push(0x00);

    query.extend_from_slice(&NBSTAT.to_be_bytes());
    query.extend_from_slice(&[0x00, 0x01]); // class IN
    query
}

/// Workstation name from a node status response.
///
/// Only unique (non-group) entries with suffix 0x00 qualify, and the
/// `__MSBROWSE__` browser election name is ignored.
pub fn parse_nbstat_response(packet: &[u8]) -> Option<String> {
    if packet.len() < 12 || packet[2] & 0x80 == 0 {
        return None;
    }
    let (_, after_name) = read_name(packet, 12)?;
    // type(2) class(2) ttl(4) rdlength(2)
    let rtype = u16::from_be_bytes([*packet.get(after_name)?, *packet.get(after_name + 1)?]);
    if rtype != NBSTAT {
        return None;
    }
    let count_at = after_name + 10;
    let count = *packet.get(count_at)? as usize;

    (0..count).find_map(|i| {
        let entry = packet.get(count_at + 1 + i * 18..count_at + 1 + (i + 1) * 18)?;
        let suffix = entry[15];
        let flags = u16::from_be_bytes([entry[16], entry[17]]);
        if suffix != 0x00 || flags & GROUP_FLAG != 0 {
            return None;
        }
        let name = String::from_utf8_lossy(&entry[..15])
            .trim_end_matches(['\0', ' '])
            .trim()
            .to_string();
        if name.is_empty() || name.contains("__MSBROWSE__") {
            None
        } else {
            Some(name)
        }
    })
}

/// Ask `ip` for its NetBIOS workstation name
pub async fn netbios_query(ip: Ipv4Addr, wait: Duration) -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    let id = next_query_id();
    let query = build_nbstat_query(id);
    socket
        .send_to(&query, SocketAddr::from((ip, NETBIOS_NS_PORT)))
        .await
        .ok()?;

    let mut buf = [0u8; 1024];
    timeout(wait, async {
        loop {
            let (len, from) = socket.recv_from(&mut buf).await.ok()?;
            if from.ip() != ip || len < 2 || buf[..2] != id.to_be_bytes() {
                continue;
            }
            return parse_nbstat_response(&buf[..len]);
        }
    })
    .await
    .ok()
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, suffix: u8, flags: u16) -> Vec<u8> {
        let mut e = format!("{:<15}", name).into_bytes();
        e.push(suffix);
        e.extend_from_slice(&flags.to_be_bytes());
        e
    }

    fn response(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut packet = build_nbstat_query(0x0101);
        packet[2] = 0x84;
        packet[5] = 0; // no question echoed back
        packet[7] = 1;
        packet.truncate(12 + 34);
        packet.extend_from_slice(&NBSTAT.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x01, 0, 0, 0, 0]);
        let body_len = 1 + entries.len() * 18;
        packet.extend_from_slice(&(body_len as u16).to_be_bytes());
        packet.push(entries.len() as u8);
        for e in entries {
            packet.extend_from_slice(e);
        }
        packet
    }

    #[test]
    fn query_is_fifty_bytes() {
        let q = build_nbstat_query(1);
        assert_eq!(q.len(), 50);
        assert_eq!(&q[13..15], b"CK");
        assert_eq!(&q[46..48], &[0x00, 0x21]);
    }

    #[test]
    fn picks_unique_workstation_name() {
        let r = response(&[
            entry("WORKGROUP", 0x00, GROUP_FLAG),
            entry("\u{1}\u{2}__MSBROWSE__\u{2}", 0x01, GROUP_FLAG),
            entry("DESKTOP-A", 0x20, 0x0400),
            entry("DESKTOP-A", 0x00, 0x0400),
        ]);
        assert_eq!(parse_nbstat_response(&r).as_deref(), Some("DESKTOP-A"));
    }

    #[test]
    fn group_only_response_has_no_name() {
        let r = response(&[entry("WORKGROUP", 0x00, GROUP_FLAG)]);
        assert_eq!(parse_nbstat_response(&r), None);
    }
}
