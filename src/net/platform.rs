//! Operating-system adapters: ping utility, ARP table, default gateway and
//! resolver cache. Everything here degrades to "no data" when the platform
//! tool is missing.

use super::arp::{parse_arp_table, ArpEntry};
use crate::errors::ScanError;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Common interface over the platform-specific system commands
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// One ICMP echo through the system ping utility; exit status is the answer
    async fn ping(&self, ip: Ipv4Addr, timeout: Duration) -> bool;

    /// Current kernel IP-to-MAC cache
    async fn arp_table(&self) -> Result<Vec<ArpEntry>, ScanError>;

    async fn default_gateway(&self) -> Option<Ipv4Addr>;

    /// Address/name pairs from the OS resolver cache, when it can be read
    async fn dns_cache(&self) -> Vec<(Ipv4Addr, String)>;
}

/// Adapter backed by the host's own command line tools
#[derive(Debug, Default)]
pub struct SystemAdapter {
    ping_missing_logged: AtomicBool,
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(program: &str, args: &[&str]) -> Result<String, ScanError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| ScanError::Adapter(format!("{}: {}", program, e)))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PlatformAdapter for SystemAdapter {
    async fn ping(&self, ip: Ipv4Addr, wait: Duration) -> bool {
        let ip_str = ip.to_string();
        let secs = wait.as_secs().max(1).to_string();
        let millis = wait.as_millis().max(1).to_string();
        let args: Vec<&str> = if cfg!(windows) {
            vec!["-n", "1", "-w", &millis, &ip_str]
        } else if cfg!(target_os = "linux") {
            vec!["-c", "1", "-W", &secs, &ip_str]
        } else {
            vec!["-c", "1", "-t", &secs, &ip_str]
        };

        let child = Command::new("ping")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        // the utility's own timeout is whole seconds, so allow a little slack
        match timeout(wait + Duration::from_millis(500), child).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                if !self.ping_missing_logged.swap(true, Ordering::Relaxed) {
                    warn!(error = %e, "ping utility unavailable, ICMP probes disabled");
                }
                false
            }
            Err(_) => false,
        }
    }

    async fn arp_table(&self) -> Result<Vec<ArpEntry>, ScanError> {
        if cfg!(target_os = "linux") {
            if let Ok(content) = tokio::fs::read_to_string("/proc/net/arp").await {
                return Ok(parse_arp_table(&content));
            }
        }
        let listing = if cfg!(windows) {
            Self::run("arp", &["-a"]).await?
        } else {
            Self::run("arp", &["-an"]).await?
        };
        Ok(parse_arp_table(&listing))
    }

    async fn default_gateway(&self) -> Option<Ipv4Addr> {
        if cfg!(target_os = "linux") {
            let content = tokio::fs::read_to_string("/proc/net/route").await.ok()?;
            return parse_proc_route(&content);
        }
        if cfg!(windows) {
            let listing = Self::run("route", &["print", "0.0.0.0"]).await.ok()?;
            return parse_windows_route(&listing);
        }
        let listing = Self::run("route", &["-n", "get", "default"]).await.ok()?;
        parse_bsd_route(&listing)
    }

    async fn dns_cache(&self) -> Vec<(Ipv4Addr, String)> {
        if !cfg!(windows) {
            return Vec::new();
        }
        match Self::run("ipconfig", &["/displaydns"]).await {
            Ok(listing) => parse_displaydns(&listing),
            Err(e) => {
                debug!(error = %e, "resolver cache unavailable");
                Vec::new()
            }
        }
    }
}

/// Default route from `/proc/net/route` (gateway column is little-endian hex)
pub fn parse_proc_route(content: &str) -> Option<Ipv4Addr> {
    content.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 3 || cols[1] != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(cols[2], 16).ok()?;
        let gw = Ipv4Addr::from(raw.swap_bytes());
        (!gw.is_unspecified()).then_some(gw)
    })
}

/// `gateway: 192.168.1.1` line of `route -n get default`
pub fn parse_bsd_route(listing: &str) -> Option<Ipv4Addr> {
    listing.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        if key.trim() == "gateway" {
            Ipv4Addr::from_str(value.trim()).ok()
        } else {
            None
        }
    })
}

/// First `0.0.0.0  0.0.0.0  <gateway>` row of `route print`
pub fn parse_windows_route(listing: &str) -> Option<Ipv4Addr> {
    listing.lines().find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() >= 3 && cols[0] == "0.0.0.0" && cols[1] == "0.0.0.0" {
            Ipv4Addr::from_str(cols[2]).ok()
        } else {
            None
        }
    })
}

/// Record name / A record pairs of `ipconfig /displaydns`
pub fn parse_displaydns(listing: &str) -> Vec<(Ipv4Addr, String)> {
    let mut out = Vec::new();
    let mut current_name: Option<String> = None;
    for line in listing.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let key = key.trim_end_matches([' ', '.']).trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("Record Name") {
            current_name = Some(value.trim_end_matches('.').to_string());
        } else if key.contains("(Host) Record") || key.eq_ignore_ascii_case("A (Host) Record") {
            if let (Some(name), Ok(ip)) = (&current_name, Ipv4Addr::from_str(value)) {
                if !name.is_empty() && !name.ends_with(".in-addr.arpa") {
                    out.push((ip, name.clone()));
                }
            }
        }
    }
    out
}
