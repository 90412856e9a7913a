//! Device-type classification.
//!
//! A fixed priority cascade: privacy MAC, hostname keywords, vendor,
//! open-port signature, then `Unknown`. The first rule that fires wins.

use crate::model::{DeviceRecord, DeviceType};
use crate::net::mac::is_locally_administered;
use once_cell::sync::Lazy;
use regex::Regex;

static HOSTNAME_RULES: Lazy<Vec<(Regex, DeviceType)>> = Lazy::new(|| {
    [
        (r"iphone", DeviceType::IPhone),
        (r"ipad", DeviceType::IPad),
        (r"macbook|imac|mac-?mini|mac-?pro|(^|[-_.])mbp([-_.]|$)", DeviceType::Mac),
        (r"apple-?tv|chromecast|roku|fire-?tv|shield|sonos|homepod", DeviceType::MediaPlayer),
        (r"android|galaxy|pixel|oneplus|xiaomi|redmi|huawei|oppo", DeviceType::AndroidDevice),
        (r"xbox|playstation|(^|[-_.])ps[345]([-_.]|$)|nintendo", DeviceType::GameConsole),
        (r"^desktop-|^laptop-|^win-|windows", DeviceType::WindowsDevice),
        (r"raspberrypi|^rpi|^pi-", DeviceType::RaspberryPi),
        (r"router|gateway|fritz|openwrt|dd-?wrt|edgerouter|mikrotik", DeviceType::Router),
        (r"^ap-|unifi|access-?point", DeviceType::AccessPoint),
        (r"(^|[-_.])switch([-_.0-9]|$)|^sw-", DeviceType::Switch),
        (r"camera|(^|[-_.])cam([-_.0-9]|$)|ipcam|hikvision|dahua|reolink", DeviceType::Camera),
        (r"printer|^hp[a-f0-9]{6}|^npi|epson|brother|canon|laserjet", DeviceType::Printer),
        (r"(^|[-_.])tv([-_.]|$)|smart-?tv|bravia|webos|tizen", DeviceType::SmartTV),
        (r"(^|[-_.])nas([-_.0-9]|$)|synology|diskstation|qnap|truenas|freenas", DeviceType::Nas),
        (r"server|^srv|-srv|proxmox|(^|[-_.])pve([-_.0-9]|$)|esxi", DeviceType::Server),
        (r"ubuntu|debian|fedora|centos|linux|(^|[-_.])arch([-_.]|$)", DeviceType::LinuxDevice),
        (r"^esp[-_]|esp32|esp8266|tasmota|shelly|tuya|sonoff|(^|[-_.])echo([-_.]|$)|alexa|nest", DeviceType::IoTDevice),
    ]
    .into_iter()
    .map(|(pattern, kind)| {
        (
            Regex::new(&format!("(?i){}", pattern)).expect("static regex"),
            kind,
        )
    })
    .collect()
});

const VENDOR_RULES: &[(&str, DeviceType)] = &[
    ("apple", DeviceType::AppleDevice),
    ("samsung", DeviceType::AndroidDevice),
    ("xiaomi", DeviceType::AndroidDevice),
    ("huawei", DeviceType::AndroidDevice),
    ("oneplus", DeviceType::AndroidDevice),
    ("raspberry", DeviceType::RaspberryPi),
    ("vmware", DeviceType::VirtualMachine),
    ("pcs systemtechnik", DeviceType::VirtualMachine),
    ("qemu", DeviceType::VirtualMachine),
    ("xensource", DeviceType::VirtualMachine),
    ("microsoft", DeviceType::VirtualMachine),
    ("ubiquiti", DeviceType::AccessPoint),
    ("ruckus", DeviceType::AccessPoint),
    ("aruba", DeviceType::AccessPoint),
    ("cisco", DeviceType::Switch),
    ("netgear", DeviceType::Router),
    ("tp-link", DeviceType::Router),
    ("linksys", DeviceType::Router),
    ("d-link", DeviceType::Router),
    ("asustek", DeviceType::Router),
    ("avm", DeviceType::Router),
    ("mikrotik", DeviceType::Router),
    ("zyxel", DeviceType::Router),
    ("brother", DeviceType::Printer),
    ("canon", DeviceType::Printer),
    ("epson", DeviceType::Printer),
    ("lexmark", DeviceType::Printer),
    ("xerox", DeviceType::Printer),
    ("kyocera", DeviceType::Printer),
    ("hewlett", DeviceType::Printer),
    ("hikvision", DeviceType::Camera),
    ("dahua", DeviceType::Camera),
    ("axis communications", DeviceType::Camera),
    ("reolink", DeviceType::Camera),
    ("synology", DeviceType::Nas),
    ("qnap", DeviceType::Nas),
    ("western digital", DeviceType::Nas),
    ("sonos", DeviceType::MediaPlayer),
    ("roku", DeviceType::MediaPlayer),
    ("lg electronics", DeviceType::SmartTV),
    ("vizio", DeviceType::SmartTV),
    ("hisense", DeviceType::SmartTV),
    ("tcl", DeviceType::SmartTV),
    ("nintendo", DeviceType::GameConsole),
    ("sony interactive", DeviceType::GameConsole),
    ("google", DeviceType::IoTDevice),
    ("amazon", DeviceType::IoTDevice),
    ("espressif", DeviceType::IoTDevice),
    ("tuya", DeviceType::IoTDevice),
    ("shelly", DeviceType::IoTDevice),
    ("philips", DeviceType::IoTDevice),
    ("intel", DeviceType::Computer),
    ("realtek", DeviceType::Computer),
    ("dell", DeviceType::Computer),
    ("lenovo", DeviceType::Computer),
    ("micro-star", DeviceType::Computer),
    ("gigabyte", DeviceType::Computer),
];

/// Classify a device from everything known about it
pub fn classify(
    hostname: &str,
    mac: Option<&str>,
    vendor: Option<&str>,
    ports: &[u16],
) -> DeviceType {
    let vendor = vendor.map(str::trim).filter(|v| !v.is_empty());

    if vendor.is_none() && mac.is_some_and(is_locally_administered) {
        return DeviceType::SmartphonePrivacy;
    }
    if let Some(kind) = classify_hostname(hostname) {
        return kind;
    }
    if let Some(kind) = vendor.and_then(classify_vendor) {
        return kind;
    }
    classify_ports(ports).unwrap_or(DeviceType::Unknown)
}

pub fn classify_record(record: &DeviceRecord) -> DeviceType {
    classify(
        &record.hostname,
        record.mac.as_deref(),
        record.vendor.as_deref(),
        &record.open_ports,
    )
}

pub fn classify_hostname(hostname: &str) -> Option<DeviceType> {
    let hostname = hostname.trim();
    if hostname.is_empty() {
        return None;
    }
    HOSTNAME_RULES
        .iter()
        .find(|(re, _)| re.is_match(hostname))
        .map(|(_, kind)| *kind)
}

pub fn classify_vendor(vendor: &str) -> Option<DeviceType> {
    let lower = vendor.to_lowercase();
    VENDOR_RULES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, kind)| *kind)
}

/// Port-signature rules
pub fn classify_ports(ports: &[u16]) -> Option<DeviceType> {
    if ports.is_empty() {
        return None;
    }
    let has = |p: u16| ports.contains(&p);
    let has_web = has(80) || has(443) || has(8080) || has(8443);

    if has(631) || has(9100) || has(515) {
        return Some(DeviceType::Printer);
    }
    if has(62078) {
        return Some(DeviceType::IPhone);
    }
    if has(445) || has(135) || has(139) {
        if (has(5000) || has(5001)) && has(22) {
            return Some(DeviceType::Nas);
        }
        return Some(DeviceType::WindowsDevice);
    }
    if has(3389) {
        return Some(DeviceType::WindowsDevice);
    }
    if has(22) && has_web {
        return Some(DeviceType::LinuxServer);
    }
    if has(554) {
        return Some(DeviceType::Camera);
    }
    if has(8008) || has(8009) || has(7000) {
        return Some(DeviceType::MediaPlayer);
    }
    if has(1883) || has(8883) {
        return Some(DeviceType::IoTDevice);
    }
    if has(53) && has_web {
        return Some(DeviceType::Router);
    }
    if has(22) {
        return Some(DeviceType::LinuxDevice);
    }
    if has_web && ports.len() <= 3 {
        return Some(DeviceType::Router);
    }
    None
}
