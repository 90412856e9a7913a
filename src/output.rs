//! Rendering of one-shot scan results as a table, JSON or CSV.

use crate::errors::ScanError;
use crate::model::{format_rtt, DeviceRecord, HostnameSource, HttpBanner};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

/// Terminal width classes for the table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Under 100 columns: no MAC, no vendor
    Narrow,
    /// 100 to 139 columns: no vendor
    Medium,
    Wide,
}

impl Layout {
    pub fn for_width(columns: u16) -> Self {
        match columns {
            0..=99 => Self::Narrow,
            100..=139 => Self::Medium,
            _ => Self::Wide,
        }
    }
}

/// Current terminal width, 120 when it cannot be read
pub fn terminal_width() -> u16 {
    crossterm::terminal::size().map(|(w, _)| w).unwrap_or(120)
}

#[derive(Debug, Serialize)]
struct DeviceJson<'a> {
    ip: String,
    hostname: &'a str,
    hostname_source: HostnameSource,
    mac: Option<&'a str>,
    vendor: Option<&'a str>,
    device_type: String,
    http_banner: Option<&'a HttpBanner>,
    /// Nanoseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    rtt: Option<u64>,
    ports: &'a [u16],
    online: bool,
}

impl<'a> From<&'a DeviceRecord> for DeviceJson<'a> {
    fn from(d: &'a DeviceRecord) -> Self {
        Self {
            ip: d.ip.to_string(),
            hostname: &d.hostname,
            hostname_source: d.hostname_source,
            mac: d.mac.as_deref(),
            vendor: d.vendor.as_deref(),
            device_type: d.device_type.label().to_string(),
            http_banner: d.http_banner.as_ref(),
            rtt: d.rtt.map(|r| r.as_nanos().min(u128::from(u64::MAX)) as u64),
            ports: &d.open_ports,
            online: d.is_online(),
        }
    }
}

pub fn write_json<W: Write>(devices: &[DeviceRecord], mut out: W) -> Result<(), ScanError> {
    let rows: Vec<DeviceJson> = devices.iter().map(DeviceJson::from).collect();
    serde_json::to_writer_pretty(&mut out, &rows)
        .map_err(|e| ScanError::Other(format!("JSON output failed: {}", e)))?;
    writeln!(out)?;
    Ok(())
}

pub fn write_csv<W: Write>(devices: &[DeviceRecord], out: W) -> Result<(), ScanError> {
    let csv_err = |e: csv::Error| ScanError::Other(format!("CSV output failed: {}", e));
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["IP", "Hostname", "RTT", "MAC", "Vendor", "DeviceType", "Ports"])
        .map_err(csv_err)?;
    for d in devices {
        let rtt = d.rtt.map(|r| format_rtt(Some(r))).unwrap_or_default();
        let ports = d
            .open_ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(";");
        writer
            .write_record([
                d.ip.to_string().as_str(),
                d.hostname.as_str(),
                rtt.as_str(),
                d.mac.as_deref().unwrap_or(""),
                d.vendor.as_deref().unwrap_or(""),
                d.device_type.label(),
                ports.as_str(),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

fn ports_cell(ports: &[u16]) -> String {
    if ports.is_empty() {
        return "—".to_string();
    }
    let mut text = ports
        .iter()
        .take(6)
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if ports.len() > 6 {
        text.push_str(&format!(" (+{})", ports.len() - 6));
    }
    text
}

fn or_dash(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "—".to_string(),
    }
}

/// Device table sized for a terminal `columns` wide
pub fn render_table(devices: &[DeviceRecord], columns: u16) -> Table {
    let layout = Layout::for_width(columns);
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_width(columns);

    let mut header = vec!["IP", "Hostname", "RTT"];
    if layout != Layout::Narrow {
        header.push("MAC");
    }
    if layout == Layout::Wide {
        header.push("Vendor");
    }
    header.extend(["Type", "Ports"]);
    table.set_header(header);

    for d in devices {
        let hostname = if d.has_hostname() {
            format!("{} ({})", d.hostname, d.hostname_source)
        } else {
            "—".to_string()
        };
        let mut ip = Cell::new(d.ip.to_string());
        if d.is_gateway {
            ip = ip.add_attribute(Attribute::Bold);
        }
        let mut row = vec![ip, Cell::new(hostname), Cell::new(format_rtt(d.rtt))];
        if layout != Layout::Narrow {
            row.push(Cell::new(or_dash(d.mac.as_deref())));
        }
        if layout == Layout::Wide {
            row.push(Cell::new(or_dash(d.vendor.as_deref())));
        }
        row.push(Cell::new(d.device_type.label()));
        row.push(Cell::new(ports_cell(&d.open_ports)));
        table.add_row(row);
    }
    table
}

/// Write `devices` to stdout in `format`
pub fn print_devices(devices: &[DeviceRecord], format: OutputFormat) -> Result<(), ScanError> {
    let stdout = std::io::stdout();
    match format {
        OutputFormat::Json => write_json(devices, stdout.lock()),
        OutputFormat::Csv => write_csv(devices, stdout.lock()),
        OutputFormat::Table => {
            let online = devices.iter().filter(|d| d.is_online()).count();
            println!("{}", render_table(devices, terminal_width()));
            println!("{} device(s), {} online", devices.len(), online);
            Ok(())
        }
    }
}
