use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// One host as seen by a single discovery pass
#[derive(Debug, Clone, PartialEq)]
pub struct HostObservation {
    pub ip: Ipv4Addr,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub device_type: Option<DeviceType>,
    pub rtt: Option<Duration>,
    pub open_ports: Option<Vec<u16>>,
    pub online: bool,
    pub http_banner: Option<HttpBanner>,
}

impl HostObservation {
    /// An online observation carrying only the address
    pub fn online(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            mac: None,
            vendor: None,
            device_type: None,
            rtt: None,
            open_ports: None,
            online: true,
            http_banner: None,
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    pub fn with_rtt(mut self, rtt: Duration) -> Self {
        self.rtt = Some(rtt);
        self
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.open_ports = Some(ports);
        self
    }
}

/// What a web server on the host said about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HttpBanner {
    pub server: Option<String>,
    pub powered_by: Option<String>,
    pub title: Option<String>,
    pub hostname_guess: Option<String>,
}

impl HttpBanner {
    pub fn is_empty(&self) -> bool {
        self.server.is_none()
            && self.powered_by.is_none()
            && self.title.is_none()
            && self.hostname_guess.is_none()
    }

    /// Compact one-line summary for tables
    pub fn summary(&self) -> String {
        [&self.server, &self.powered_by, &self.title]
            .iter()
            .filter_map(|v| v.as_deref())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Presence state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which probe produced a device's hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostnameSource {
    #[default]
    Unset,
    DnsCache,
    Dns,
    Mdns,
    Netbios,
    Llmnr,
    Http,
    Ssdp,
    Vendor,
    /// Resolution was attempted and nothing answered
    None,
}

impl HostnameSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::DnsCache => "dns-cache",
            Self::Dns => "dns",
            Self::Mdns => "mdns",
            Self::Netbios => "netbios",
            Self::Llmnr => "llmnr",
            Self::Http => "http",
            Self::Ssdp => "ssdp",
            Self::Vendor => "vendor",
            Self::None => "none",
        }
    }
}

impl fmt::Display for HostnameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HostnameSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Classification of device types based on hostname, MAC, vendor and ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    #[default]
    Unknown,
    SmartphonePrivacy,
    IPhone,
    IPad,
    Mac,
    AppleDevice,
    AndroidDevice,
    WindowsDevice,
    Computer,
    LinuxDevice,
    LinuxServer,
    Server,
    Router,
    AccessPoint,
    Switch,
    Printer,
    Camera,
    SmartTV,
    MediaPlayer,
    Nas,
    GameConsole,
    IoTDevice,
    RaspberryPi,
    VirtualMachine,
}

impl DeviceType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::SmartphonePrivacy => "Smartphone (Privacy)",
            Self::IPhone => "iPhone",
            Self::IPad => "iPad",
            Self::Mac => "Mac",
            Self::AppleDevice => "Apple Device",
            Self::AndroidDevice => "Android",
            Self::WindowsDevice => "Windows",
            Self::Computer => "Computer",
            Self::LinuxDevice => "Linux",
            Self::LinuxServer => "Linux Server",
            Self::Server => "Server",
            Self::Router => "Router",
            Self::AccessPoint => "Access Point",
            Self::Switch => "Switch",
            Self::Printer => "Printer",
            Self::Camera => "Camera",
            Self::SmartTV => "Smart TV",
            Self::MediaPlayer => "Media Player",
            Self::Nas => "NAS",
            Self::GameConsole => "Game Console",
            Self::IoTDevice => "IoT Device",
            Self::RaspberryPi => "Raspberry Pi",
            Self::VirtualMachine => "Virtual Machine",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DeviceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Per-device lifecycle state kept for the whole run
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub ip: Ipv4Addr,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub device_type: DeviceType,
    pub is_gateway: bool,

    /// Empty until some resolver produced a name
    pub hostname: String,
    pub hostname_source: HostnameSource,

    pub status: DeviceStatus,
    pub first_seen: Instant,
    pub first_seen_wall: DateTime<Local>,
    pub first_seen_scan: u64,
    pub last_seen: Instant,
    pub status_since: Instant,

    pub flaps: u32,
    pub offline_total: Duration,
    pub rtt: Option<Duration>,
    pub last_lookup: Option<Instant>,
    pub open_ports: Vec<u16>,
    pub http_banner: Option<HttpBanner>,
}

impl DeviceRecord {
    /// A freshly discovered, online device
    pub fn new(ip: Ipv4Addr, scan: u64, reference: Instant) -> Self {
        Self {
            ip,
            mac: None,
            vendor: None,
            device_type: DeviceType::Unknown,
            is_gateway: false,
            hostname: String::new(),
            hostname_source: HostnameSource::Unset,
            status: DeviceStatus::Online,
            first_seen: reference,
            first_seen_wall: Local::now(),
            first_seen_scan: scan,
            last_seen: reference,
            status_since: reference,
            flaps: 0,
            offline_total: Duration::ZERO,
            rtt: None,
            last_lookup: None,
            open_ports: Vec::new(),
            http_banner: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }

    pub fn has_hostname(&self) -> bool {
        !self.hostname.is_empty()
    }

    /// Time spent online since first seen. Frozen while the device is offline.
    pub fn uptime(&self, reference: Instant) -> Duration {
        let end = match self.status {
            DeviceStatus::Online => reference,
            DeviceStatus::Offline => self.status_since,
        };
        end.saturating_duration_since(self.first_seen)
            .saturating_sub(self.offline_total)
    }

    /// Time since the device went offline, zero while online
    pub fn downtime(&self, reference: Instant) -> Duration {
        match self.status {
            DeviceStatus::Online => Duration::ZERO,
            DeviceStatus::Offline => reference.saturating_duration_since(self.status_since),
        }
    }

    /// Flip presence state at `reference`, counting one flap
    pub(crate) fn transition(&mut self, status: DeviceStatus, reference: Instant) {
        if self.status == status {
            return;
        }
        if self.status == DeviceStatus::Offline {
            self.offline_total += reference.saturating_duration_since(self.status_since);
        }
        self.status = status;
        self.status_since = reference;
        self.flaps += 1;
    }
}

/// Format a duration as `1h02m`, `3m04s` or `12s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 86_400 {
        format!("{}d{:02}h", secs / 86_400, (secs % 86_400) / 3600)
    } else if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Format a round-trip time in milliseconds, `—` when unknown
pub fn format_rtt(rtt: Option<Duration>) -> String {
    match rtt {
        Some(d) if !d.is_zero() => format!("{:.1}ms", d.as_secs_f64() * 1000.0),
        _ => "—".to_string(),
    }
}
