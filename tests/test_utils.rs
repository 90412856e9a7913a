use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use lanwatch::discovery::DiscoveryStrategy;
use lanwatch::errors::ScanError;
use lanwatch::model::{DeviceRecord, HostObservation, HostnameSource};
use lanwatch::net::{ArpEntry, PlatformAdapter};
use lanwatch::detect::HostnameProbe;
use std::collections::{HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Shorthand for `a.b.c.d`
#[allow(dead_code)]
pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Create an online observation with an optional MAC
#[allow(dead_code)]
pub fn observation(addr: &str, mac: Option<&str>) -> HostObservation {
    let obs = HostObservation::online(ip(addr));
    match mac {
        Some(mac) => obs.with_mac(mac),
        None => obs,
    }
}

/// Create a fresh device record first seen at `reference`
#[allow(dead_code)]
pub fn create_test_device(addr: &str, reference: Instant) -> DeviceRecord {
    DeviceRecord::new(ip(addr), 1, reference)
}

/// Platform adapter answering from fixed tables
#[derive(Default)]
#[allow(dead_code)]
pub struct MockAdapter {
    pub reachable: HashSet<Ipv4Addr>,
    pub arp: Vec<ArpEntry>,
    pub arp_fails: bool,
    pub gateway: Option<Ipv4Addr>,
    pub dns_cache: Vec<(Ipv4Addr, String)>,
    pub pings: AtomicUsize,
}

#[allow(dead_code)]
impl MockAdapter {
    pub fn with_arp(entries: &[(&str, &str)]) -> Self {
        Self {
            arp: entries
                .iter()
                .map(|(addr, mac)| ArpEntry {
                    ip: ip(addr),
                    mac: mac.to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    async fn ping(&self, ip: Ipv4Addr, _timeout: Duration) -> bool {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.reachable.contains(&ip)
    }

    async fn arp_table(&self) -> Result<Vec<ArpEntry>, ScanError> {
        if self.arp_fails {
            return Err(ScanError::Adapter("arp not available".to_string()));
        }
        Ok(self.arp.clone())
    }

    async fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    async fn dns_cache(&self) -> Vec<(Ipv4Addr, String)> {
        self.dns_cache.clone()
    }
}

/// Hostname probe with a fixed answer per address
#[allow(dead_code)]
pub struct MockProbe {
    pub source: HostnameSource,
    pub answers: Vec<(Ipv4Addr, String)>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockProbe {
    pub fn new(source: HostnameSource, answers: &[(&str, &str)]) -> Self {
        Self {
            source,
            answers: answers
                .iter()
                .map(|(addr, name)| (ip(addr), name.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn silent(source: HostnameSource) -> Self {
        Self::new(source, &[])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostnameProbe for MockProbe {
    fn source(&self) -> HostnameSource {
        self.source
    }

    async fn lookup(&self, ip: Ipv4Addr, _wait: Duration) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .iter()
            .find(|(addr, _)| *addr == ip)
            .map(|(_, name)| name.clone())
    }
}

/// Strategy replaying a scripted list of scan results, then empty scans
#[allow(dead_code)]
pub struct ScriptedStrategy {
    rounds: Mutex<VecDeque<Result<Vec<HostObservation>, String>>>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedStrategy {
    pub fn new(rounds: Vec<Result<Vec<HostObservation>, String>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for ScriptedStrategy {
    async fn discover(
        &self,
        _network: Ipv4Network,
        _cancel: &CancellationToken,
    ) -> Result<Vec<HostObservation>, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.rounds.lock().unwrap().pop_front();
        match next {
            Some(Ok(observations)) => Ok(observations),
            Some(Err(message)) => Err(ScanError::Other(message)),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Accept connections on an ephemeral 127.0.0.1 port, greeting each with
/// `banner` when given. Returns the port.
#[allow(dead_code)]
pub async fn spawn_listener(banner: Option<&'static str>) -> u16 {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            if let Some(text) = banner {
                let _ = stream.write_all(text.as_bytes()).await;
            }
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                drop(stream);
            });
        }
    });
    port
}

/// A 127.0.0.1 port with nothing listening on it
#[allow(dead_code)]
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
