//! Command-line surface and the merge of flags, config file and defaults.

use crate::budget::ThreadBudget;
use crate::config::{parse_duration, parse_port_list, FileConfig, ScanConfig};
use crate::constants::DEFAULT_INTERVAL;
use crate::discovery::DiscoveryMode;
use crate::errors::ScanError;
use crate::net::cidr::host_count;
use crate::net::interface::network_for_interface;
use crate::net::{parse_cidr, LocalInterface};
use crate::output::OutputFormat;
use clap::{ArgGroup, Args, Parser, Subcommand};
use clap_complete::Shell;
use ipnetwork::Ipv4Network;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "lanwatch", version, about = "Interactive LAN discovery and live host monitoring")]
pub struct Cli {
    /// TOML file with default settings
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug detail
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a network once and print the devices found
    Scan(ScanArgs),
    /// Monitor a network continuously in an interactive table
    Watch(WatchArgs),
    /// Print version, build date and commit
    Version,
    /// Print a shell completion script
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("strategy").args(["fast", "thorough", "arp", "hybrid"]).multiple(false)))]
pub struct ScanArgs {
    /// Target network in CIDR notation (e.g. 192.168.1.0/24) or an interface name
    pub network: String,

    /// Total concurrency budget shared by probes and resolvers
    #[arg(long, value_name = "N")]
    pub concurrent: Option<usize>,

    /// Per-host TCP timeout, e.g. 800ms or 2s
    #[arg(long, value_name = "D")]
    pub timeout: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Extra TCP ports to probe on every host found, e.g. 22,80,443
    #[arg(long, value_name = "P1,P2,...")]
    pub ports: Option<String>,

    /// Single connect to 80, 443 or 445 per host
    #[arg(long)]
    pub fast: bool,

    /// Broad port set with double-connect validation
    #[arg(long)]
    pub thorough: bool,

    /// Ping sweep plus ARP table read
    #[arg(long)]
    pub arp: bool,

    /// ARP with TCP fallback (default)
    #[arg(long)]
    pub hybrid: bool,
}

impl ScanArgs {
    fn flag_mode(&self) -> Option<DiscoveryMode> {
        [
            (self.fast, DiscoveryMode::Fast),
            (self.thorough, DiscoveryMode::Thorough),
            (self.arp, DiscoveryMode::Arp),
            (self.hybrid, DiscoveryMode::Hybrid),
        ]
        .into_iter()
        .find_map(|(set, mode)| set.then_some(mode))
    }
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Target network or interface name; prompts for an interface when omitted
    pub network: Option<String>,

    /// Time between full scans, e.g. 30s or 2m
    #[arg(long, value_name = "D")]
    pub interval: Option<String>,

    /// hybrid, arp, fast, thorough or conservative
    #[arg(long)]
    pub mode: Option<String>,

    /// Ports used by TCP discovery, e.g. 22,80,443
    #[arg(long, value_name = "P1,P2,...")]
    pub ports: Option<String>,

    /// Total concurrency budget shared by probes and resolvers
    #[arg(long, value_name = "N")]
    pub max_threads: Option<usize>,
}

/// Fully resolved settings for `scan`
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub network: Ipv4Network,
    pub mode: DiscoveryMode,
    pub format: OutputFormat,
    pub budget: ThreadBudget,
    pub config: ScanConfig,
}

impl ScanSettings {
    /// Flags win over the file, the file wins over defaults
    pub fn resolve(args: &ScanArgs, file: &FileConfig) -> Result<Self, ScanError> {
        let network = parse_target(&args.network)?;
        let mode = match (args.flag_mode(), file.mode.as_deref()) {
            (Some(mode), _) => mode,
            (None, Some(mode)) => DiscoveryMode::from_str(mode)?,
            (None, None) => DiscoveryMode::default(),
        };
        let format = match (args.format, file.format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(format)) => parse_format(format)?,
            (None, None) => OutputFormat::default(),
        };

        let mut config = ScanConfig::default();
        if let Some(timeout) = args.timeout.as_deref().or(file.timeout.as_deref()) {
            config.tcp_connect_timeout_ms = duration_ms(timeout)?;
        }
        if let Some(ports) = args.ports.as_deref().or(file.ports.as_deref()) {
            config.enrich_ports = parse_port_list(ports)?;
        }
        let budget = ThreadBudget::resolve(host_count(network), args.concurrent.or(file.concurrent));

        Ok(Self {
            network,
            mode,
            format,
            budget,
            config,
        })
    }
}

/// Fully resolved settings for `watch`; the network is chosen separately
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub network: Option<Ipv4Network>,
    pub interval: Duration,
    pub mode: DiscoveryMode,
    pub max_threads: Option<usize>,
    pub config: ScanConfig,
}

impl WatchSettings {
    pub fn resolve(args: &WatchArgs, file: &FileConfig) -> Result<Self, ScanError> {
        let network = args.network.as_deref().map(parse_target).transpose()?;
        let interval = match args.interval.as_deref().or(file.interval.as_deref()) {
            Some(raw) => parse_duration(raw)?,
            None => DEFAULT_INTERVAL,
        };
        if interval.is_zero() {
            return Err(ScanError::InvalidArgument("interval must be positive".to_string()));
        }
        let mode = match args.mode.as_deref().or(file.mode.as_deref()) {
            Some(mode) => DiscoveryMode::from_str(mode)?,
            None => DiscoveryMode::default(),
        };

        let mut config = ScanConfig::default();
        if let Some(timeout) = file.timeout.as_deref() {
            config.tcp_connect_timeout_ms = duration_ms(timeout)?;
        }
        if let Some(ports) = args.ports.as_deref().or(file.ports.as_deref()) {
            config.discovery_ports = parse_port_list(ports)?;
            if config.discovery_ports.is_empty() {
                return Err(ScanError::InvalidPortSpec("no ports given".to_string()));
            }
        }

        Ok(Self {
            network,
            interval,
            mode,
            max_threads: args.max_threads.or(file.max_threads),
            config,
        })
    }

    pub fn budget(&self, network: Ipv4Network) -> ThreadBudget {
        ThreadBudget::resolve(host_count(network), self.max_threads)
    }
}

/// A CIDR, or the name of a local interface whose subnet is meant
fn parse_target(raw: &str) -> Result<Ipv4Network, ScanError> {
    if raw.starts_with(|c: char| c.is_ascii_digit()) {
        parse_cidr(raw)
    } else {
        network_for_interface(raw)
    }
}

fn duration_ms(raw: &str) -> Result<u64, ScanError> {
    let ms = parse_duration(raw)?.as_millis() as u64;
    if ms == 0 {
        return Err(ScanError::InvalidArgument(format!("timeout '{}' is too short", raw)));
    }
    Ok(ms)
}

fn parse_format(raw: &str) -> Result<OutputFormat, ScanError> {
    match raw.trim().to_lowercase().as_str() {
        "table" => Ok(OutputFormat::Table),
        "json" => Ok(OutputFormat::Json),
        "csv" => Ok(OutputFormat::Csv),
        other => Err(ScanError::InvalidArgument(format!("unknown format '{}'", other))),
    }
}

/// Version text with optional build metadata
pub fn version_text() -> String {
    format!(
        "lanwatch {}\nbuild date: {}\ncommit: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("LANWATCH_BUILD_DATE").unwrap_or("unknown"),
        option_env!("LANWATCH_COMMIT").unwrap_or("unknown"),
    )
}

/// Ask which interface to watch. A single candidate is taken without asking.
pub fn choose_interface<R: BufRead, W: Write>(
    candidates: &[LocalInterface],
    mut input: R,
    mut out: W,
) -> Result<Ipv4Network, ScanError> {
    match candidates {
        [] => Err(ScanError::NetworkInterfaceCustom(
            "no IPv4 interface available to monitor".to_string(),
        )),
        [only] => Ok(only.network),
        _ => {
            writeln!(out, "Available networks:")?;
            for (i, c) in candidates.iter().enumerate() {
                writeln!(out, "  {}) {:<12} {:<15} {}", i + 1, c.name, c.ip, c.network)?;
            }
            loop {
                write!(out, "Select a network [1-{}]: ", candidates.len())?;
                out.flush()?;
                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    return Err(ScanError::InvalidArgument("no network selected".to_string()));
                }
                match line.trim().parse::<usize>() {
                    Ok(n) if (1..=candidates.len()).contains(&n) => return Ok(candidates[n - 1].network),
                    _ => writeln!(out, "Please enter a number between 1 and {}", candidates.len())?,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn iface(name: &str, net: &str) -> LocalInterface {
        let network: Ipv4Network = net.parse().unwrap();
        LocalInterface {
            name: name.into(),
            ip: Ipv4Addr::from(u32::from(network.network()) + 10),
            network,
            mac: None,
        }
    }

    #[test]
    fn strategy_flags_conflict() {
        let err = Cli::try_parse_from(["lanwatch", "scan", "10.0.0.0/24", "--fast", "--arp"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn flags_override_file() {
        let cli = Cli::try_parse_from([
            "lanwatch", "scan", "10.0.0.0/24", "--thorough", "--timeout", "2s", "--concurrent", "10",
        ])
        .unwrap();
        let Command::Scan(args) = cli.command else { panic!("expected scan") };
        let file = FileConfig::parse("mode = \"fast\"\ntimeout = \"500ms\"\nformat = \"json\"\n").unwrap();
        let settings = ScanSettings::resolve(&args, &file).unwrap();
        assert_eq!(settings.mode, DiscoveryMode::Thorough);
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.config.tcp_connect_timeout_ms, 2000);
        assert_eq!(settings.budget, ThreadBudget { scan: 5, reachability: 3, dns: 2 });
    }

    #[test]
    fn bad_network_is_input_error() {
        let cli = Cli::try_parse_from(["lanwatch", "scan", "10.0.0.0/40"]).unwrap();
        let Command::Scan(args) = cli.command else { panic!("expected scan") };
        let err = ScanSettings::resolve(&args, &FileConfig::default()).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn unknown_target_is_input_error() {
        let cli = Cli::try_parse_from(["lanwatch", "scan", "not-a-network"]).unwrap();
        let Command::Scan(args) = cli.command else { panic!("expected scan") };
        let err = ScanSettings::resolve(&args, &FileConfig::default()).unwrap_err();
        assert!(err.is_input_error(), "{err}");

        let cli = Cli::try_parse_from(["lanwatch", "watch", "eth99"]).unwrap();
        let Command::Watch(args) = cli.command else { panic!("expected watch") };
        let err = WatchSettings::resolve(&args, &FileConfig::default()).unwrap_err();
        assert!(err.is_input_error(), "{err}");
    }

    #[test]
    fn interface_prompt() {
        let candidates = vec![iface("eth0", "192.168.1.0/24"), iface("wlan0", "10.0.0.0/24")];
        let mut out = Vec::new();
        let chosen = choose_interface(&candidates, "7\n2\n".as_bytes(), &mut out).unwrap();
        assert_eq!(chosen, "10.0.0.0/24".parse::<Ipv4Network>().unwrap());
        assert!(String::from_utf8(out).unwrap().contains("between 1 and 2"));

        let single = choose_interface(&candidates[..1], "".as_bytes(), Vec::new()).unwrap();
        assert_eq!(single, candidates[0].network);
        assert!(choose_interface(&[], "".as_bytes(), Vec::new()).is_err());
    }
}
