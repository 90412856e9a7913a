use crate::errors::ScanError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration settings for probing and discovery
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// High-signal ports used by the conservative strategy
    pub discovery_ports: Vec<u16>,

    /// Broader port set used by the thorough strategy
    pub thorough_ports: Vec<u16>,

    /// Ports probed per online host during one-shot enrichment (`--ports`)
    pub enrich_ports: Vec<u16>,

    /// Timeout in milliseconds for ping operations
    pub ping_timeout_ms: u64,

    /// Per-host TCP budget in milliseconds, split across the probed ports
    pub tcp_connect_timeout_ms: u64,

    /// Timeout in milliseconds for banner grabbing operations
    pub banner_read_timeout_ms: u64,

    /// Pause after a ping sweep so the kernel ARP cache settles
    pub arp_settle_ms: u64,

    /// Timeout in milliseconds for a single hostname probe
    pub resolve_timeout_ms: u64,

    /// Connect timeout used by the per-host inspector
    pub inspect_connect_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            discovery_ports: vec![
                22,  // SSH
                80,  // HTTP
                443, // HTTPS
                445, // SMB
                135, // MS RPC
            ],
            thorough_ports: vec![
                21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 445, 993, 995, 3389, 5900, 8080,
                8443,
            ],
            enrich_ports: Vec::new(),
            ping_timeout_ms: 1000,
            tcp_connect_timeout_ms: 1000,
            banner_read_timeout_ms: 500,
            arp_settle_ms: 500,
            resolve_timeout_ms: 1000,
            inspect_connect_timeout_ms: 2000,
        }
    }
}

impl ScanConfig {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_connect_timeout_ms)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_read_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_millis(self.inspect_connect_timeout_ms)
    }
}

/// Values read from a `--config` TOML file. Every key is optional; command
/// line flags override whatever is set here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub interval: Option<String>,
    pub mode: Option<String>,
    pub timeout: Option<String>,
    pub ports: Option<String>,
    pub max_threads: Option<usize>,
    pub concurrent: Option<usize>,
    pub format: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ScanError> {
        toml::from_str(content).map_err(|e| ScanError::Config(e.to_string()))
    }
}

/// Parse `500ms`, `2s`, `1m`, `1h` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ScanError> {
    let s = input.trim();
    let invalid = || ScanError::InvalidArgument(format!("invalid duration '{}'", input));
    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().map_err(|_| invalid())?;
    let secs = match unit.trim() {
        "ms" => value / 1000.0,
        "" | "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(invalid()),
    };
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Parse a comma separated TCP port list such as `22,80,443`.
pub fn parse_port_list(input: &str) -> Result<Vec<u16>, ScanError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ScanError::InvalidPortSpec(format!("invalid port '{}'", p))),
        })
        .collect()
}
