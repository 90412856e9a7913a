use super::netbios::netbios_query;
use super::wire::{build_ptr_query, first_ptr_answer, next_query_id, reverse_name};
use super::HostnameProbe;
use crate::model::HostnameSource;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MDNS_PORT: u16 = 5353;
const LLMNR_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 252);
const LLMNR_PORT: u16 = 5355;

/// Reverse DNS through the OS resolver
pub async fn dns_reverse(ip: Ipv4Addr, wait: Duration) -> Option<String> {
    let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(ip)).ok());
    let name = timeout(wait, lookup).await.ok()?.ok()??;
    let name = name.trim_end_matches('.').to_string();
    // getnameinfo echoes the address back when there is no PTR record
    if name.is_empty() || name.parse::<Ipv4Addr>().is_ok() {
        None
    } else {
        Some(name)
    }
}

/// All names the resolver returns for `ip`, lower-cased without trailing dots
pub async fn reverse_names(ip: Ipv4Addr, wait: Duration) -> Vec<String> {
    dns_reverse(ip, wait)
        .await
        .map(|n| vec![n.to_lowercase()])
        .unwrap_or_default()
}

/// PTR query for the reversed address sent to the mDNS group; first answer wins
pub async fn mdns_query(ip: Ipv4Addr, wait: Duration) -> Option<String> {
    let name = ptr_exchange(
        SocketAddr::from((MDNS_GROUP, MDNS_PORT)),
        &reverse_name(ip),
        true,
        wait,
        None,
    )
    .await?;
    clean_local_name(&name)
}

/// LLMNR PTR query, unicast to the target first and the multicast group
/// with whatever time is left
pub async fn llmnr_query(ip: Ipv4Addr, wait: Duration) -> Option<String> {
    let deadline = Instant::now() + wait;
    let name = reverse_name(ip);
    let unicast = ptr_exchange(
        SocketAddr::from((ip, LLMNR_PORT)),
        &name,
        false,
        wait / 2,
        Some(ip),
    )
    .await;
    let answer = match unicast {
        Some(answer) => Some(answer),
        None => {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                None
            } else {
                ptr_exchange(SocketAddr::from((LLMNR_GROUP, LLMNR_PORT)), &name, false, left, None)
                    .await
            }
        }
    };
    answer.and_then(|n| clean_local_name(&n))
}

async fn ptr_exchange(
    dest: SocketAddr,
    name: &str,
    unicast_response: bool,
    wait: Duration,
    expect_from: Option<Ipv4Addr>,
) -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    let id = next_query_id();
    let query = build_ptr_query(id, name, unicast_response);
    socket.send_to(&query, dest).await.ok()?;

    let mut buf = [0u8; 1500];
    timeout(wait, async {
        loop {
            let (len, from) = socket.recv_from(&mut buf).await.ok()?;
            if let Some(expected) = expect_from {
                if from.ip() != IpAddr::V4(expected) {
                    continue;
                }
            }
            // mDNS responders may zero the id; LLMNR must echo it
            let echoed = u16::from_be_bytes([buf[0], buf[1]]);
            if len < 12 || (echoed != id && echoed != 0) {
                continue;
            }
            if let Some(answer) = first_ptr_answer(&buf[..len]) {
                return Some(answer);
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Strip the trailing dot and `.local` suffix; reject empty results
pub fn clean_local_name(name: &str) -> Option<String> {
    let name = name.trim().trim_end_matches('.');
    let name = name
        .strip_suffix(".local")
        .or_else(|| name.strip_suffix(".LOCAL"))
        .unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

/// Reverse DNS via the system resolver
#[derive(Debug, Default)]
pub struct ReverseDnsProbe;

#[async_trait]
impl HostnameProbe for ReverseDnsProbe {
    fn source(&self) -> HostnameSource {
        HostnameSource::Dns
    }

    async fn lookup(&self, ip: Ipv4Addr, wait: Duration) -> Option<String> {
        dns_reverse(ip, wait).await
    }
}

/// Multicast DNS PTR lookup
#[derive(Debug, Default)]
pub struct MdnsProbe;

#[async_trait]
impl HostnameProbe for MdnsProbe {
    fn source(&self) -> HostnameSource {
        HostnameSource::Mdns
    }

    async fn lookup(&self, ip: Ipv4Addr, wait: Duration) -> Option<String> {
        mdns_query(ip, wait).await
    }
}

/// Link-local multicast name resolution
#[derive(Debug, Default)]
pub struct LlmnrProbe;

#[async_trait]
impl HostnameProbe for LlmnrProbe {
    fn source(&self) -> HostnameSource {
        HostnameSource::Llmnr
    }

    async fn lookup(&self, ip: Ipv4Addr, wait: Duration) -> Option<String> {
        llmnr_query(ip, wait).await
    }
}

/// NetBIOS node status
#[derive(Debug, Default)]
pub struct NetbiosProbe;

#[async_trait]
impl HostnameProbe for NetbiosProbe {
    fn source(&self) -> HostnameSource {
        HostnameSource::Netbios
    }

    async fn lookup(&self, ip: Ipv4Addr, wait: Duration) -> Option<String> {
        netbios_query(ip, wait).await
    }
}
