//! Drawing of the device table, status lines and overlays.

use std::time::Instant;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;

use crate::inspect::ProbeResult;
use crate::model::{format_duration, format_rtt, DeviceRecord};
use crate::net::PortState;

use super::app::{App, InspectorState, Mode};
use super::theme;

/// Lines around the table rows: header, status, footer, borders, column titles
pub const CHROME: u16 = 6;

pub fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    app.view.set_viewport(area.height, CHROME);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(frame, chunks[0], app);
    draw_table(frame, chunks[1], app);
    draw_status(frame, chunks[2], app);
    draw_footer(frame, chunks[3], app);

    match app.mode {
        Mode::Help => draw_help(frame, area),
        Mode::Inspector => {
            if let Some(inspector) = app.inspector.as_ref() {
                draw_inspector(frame, area, inspector);
            }
        }
        _ => {}
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let text = format!(
        " lanwatch  {}  mode {}  every {}  sort {}{}",
        app.banner.network,
        app.banner.strategy,
        format_duration(app.banner.interval),
        app.view.sort.label(),
        if app.view.descending { " \u{2193}" } else { " \u{2191}" },
    );
    frame.render_widget(Paragraph::new(text).style(theme::HEADER), area);
}

fn device_row(d: &DeviceRecord, reference: Instant) -> Row<'static> {
    let ip = if d.is_gateway {
        format!("{} (gw)", d.ip)
    } else {
        d.ip.to_string()
    };
    let presence = if d.is_online() {
        format_duration(d.uptime(reference))
    } else {
        format!("down {}", format_duration(d.downtime(reference)))
    };
    let status = if d.is_online() {
        Cell::from(Span::styled("online", theme::STATUS_ONLINE))
    } else {
        Cell::from(Span::styled("offline", theme::STATUS_OFFLINE))
    };
    let row = Row::new(vec![
        Cell::from(ip),
        Cell::from(d.hostname.clone()),
        Cell::from(d.mac.clone().unwrap_or_default()),
        Cell::from(d.vendor.clone().unwrap_or_default()),
        Cell::from(d.device_type.label()),
        Cell::from(format_rtt(d.rtt)),
        Cell::from(d.first_seen_wall.format("%H:%M:%S").to_string()),
        Cell::from(presence),
        Cell::from(d.flaps.to_string()),
        status,
    ]);
    if d.is_online() {
        row
    } else {
        row.style(theme::ROW_OFFLINE)
    }
}

fn draw_table(frame: &mut Frame, area: Rect, app: &App) {
    let reference = Instant::now();
    let rows = app.rows();
    let total = rows.len();
    let range = app.view.page_range(total);
    let page_rows: Vec<Row> = rows[range.clone()]
        .iter()
        .map(|d| device_row(d, reference))
        .collect();

    let header = Row::new(vec![
        "IP", "Hostname", "MAC", "Vendor", "Device", "RTT", "First Seen", "Up/Down", "Flaps", "Status",
    ])
    .style(theme::TABLE_HEADER);
    let widths = [
        Constraint::Length(20),
        Constraint::Min(16),
        Constraint::Length(17),
        Constraint::Min(12),
        Constraint::Length(14),
        Constraint::Length(9),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(5),
        Constraint::Length(7),
    ];
    let title = format!(
        " Devices {}/{}  page {}/{} ",
        total,
        app.snapshot.len(),
        app.view.page(total) + 1,
        app.view.page_count(total),
    );
    let table = Table::new(page_rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(theme::ROW_SELECTED);

    let mut state = TableState::default();
    state.select(app.view.selected(total).map(|i| i - range.start));
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &App) {
    let scan = match (app.scanning, app.last_scan) {
        (true, _) => format!("scan {} running", app.snapshot.scan + 1),
        (false, Some((scan, elapsed))) => {
            format!("scan {} took {:.1}s", scan, elapsed.as_secs_f64())
        }
        (false, None) => "waiting for first scan".to_string(),
    };
    let mut text = format!(
        " {}  {} online / {} known  resolvers {}",
        scan,
        app.snapshot.online_count(),
        app.snapshot.len(),
        app.active_resolvers(),
    );
    if let Some(notice) = app.notice() {
        text.push_str("  ");
        text.push_str(notice);
    }
    frame.render_widget(Paragraph::new(text).style(theme::STATUS_BAR), area);
}

fn hint_line(hints: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {}", key), theme::FOOTER_KEY));
        spans.push(Span::raw(format!(" {} ", label)));
    }
    Line::from(spans)
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let line = match app.mode {
        Mode::FilterInput => {
            let mut spans = vec![
                Span::styled(" filter: ", theme::FOOTER_KEY),
                Span::raw(format!("{}_", app.filter_input)),
            ];
            if let Some(error) = app.view.filter_error() {
                spans.push(Span::styled(format!("  {}", error), theme::TEXT_ERROR));
            }
            Line::from(spans)
        }
        _ if !app.view.filter().is_empty() => Line::from(vec![
            Span::styled(" filter ", theme::FOOTER_KEY),
            Span::raw(app.view.filter().text().to_string()),
            Span::styled("  c clear  ? help", theme::TEXT_DIM),
        ]),
        _ => hint_line(&[
            ("q", "quit"),
            ("/", "filter"),
            ("Enter", "inspect"),
            ("n/p", "page"),
            ("i h m v d r t u f", "sort"),
            ("?", "help"),
        ]),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn help_lines() -> Vec<Line<'static>> {
    let bold = |s: &'static str| Line::from(Span::styled(s, theme::TEXT_BOLD));
    let normal = |s: &'static str| Line::from(s);
    vec![
        bold("  Keys"),
        normal(""),
        normal("  q / Esc        quit"),
        normal("  Up / Down      move selection"),
        normal("  PgUp / PgDn    move a page"),
        normal("  Home / End     first / last row"),
        normal("  n / p          next / previous page"),
        normal("  Enter          inspect the selected device"),
        normal("  /              edit filter, Up/Down recalls history"),
        normal("  c              clear filter"),
        normal(""),
        bold("  Sort (press again to reverse)"),
        normal(""),
        normal("  i ip   h hostname   m mac   v vendor   d device"),
        normal("  r rtt  t first seen u uptime f flaps"),
        normal(""),
        bold("  Filter"),
        normal(""),
        normal("  apple                any column contains 'apple'"),
        normal("  vendor=cisco         column match, * wildcard"),
        normal("  ip=10.0.0.0/24       CIDR or 10.0.0.1-10.0.0.50"),
        normal("  status=online && !device=printer"),
        normal("  AND OR NOT, && || !, parentheses and quotes"),
        normal(""),
        Line::from(Span::styled("  any key to close", theme::TEXT_DIM)),
    ]
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(70, 80, area);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(theme::OVERLAY_BG);
    frame.render_widget(Paragraph::new(help_lines()).block(block), popup);
}

fn result_line(result: &ProbeResult) -> Line<'static> {
    let style = match result.state {
        PortState::Open => theme::PORT_OPEN,
        PortState::Closed => theme::PORT_CLOSED,
        PortState::Filtered => theme::PORT_FILTERED,
    };
    let mut spans = vec![
        Span::raw(format!("  {:<6} {:<12} ", result.token, result.service)),
        Span::styled(format!("{:<9}", result.state.as_str()), style),
        Span::styled(format!("{:>8}", format_rtt(Some(result.elapsed))), theme::TEXT_DIM),
    ];
    if let Some(banner) = result.banner.as_deref() {
        spans.push(Span::raw(format!("  {}", banner)));
    }
    Line::from(spans)
}

fn draw_inspector(frame: &mut Frame, area: Rect, inspector: &InspectorState) {
    let popup = centered_rect(80, 80, area);
    frame.render_widget(Clear, popup);

    let record = &inspector.record;
    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "{}  {}  {}",
                record.ip,
                if record.has_hostname() { record.hostname.as_str() } else { "(no name)" },
                record.device_type.label()
            ),
            theme::TEXT_BOLD,
        )),
        Line::from(format!(
            "MAC {}  vendor {}  name via {}",
            record.mac.as_deref().unwrap_or("-"),
            record.vendor.as_deref().unwrap_or("-"),
            record.hostname_source,
        )),
    ];
    if let Some(banner) = record.http_banner.as_ref() {
        lines.push(Line::from(format!("HTTP {}", banner.summary())));
    }
    if let Some(dns) = inspector.dns.as_ref() {
        let text = dns.describe();
        if !text.is_empty() {
            lines.push(Line::from(text));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("ports: ", theme::FOOTER_KEY),
        Span::raw(format!("{}_", inspector.spec)),
    ]));
    if let Some(error) = inspector.error.as_deref() {
        lines.push(Line::from(Span::styled(error.to_string(), theme::TEXT_ERROR)));
    }
    lines.push(Line::from(""));
    lines.extend(inspector.results.iter().map(result_line));
    if inspector.running {
        lines.push(Line::from(Span::styled("  probing...", theme::TEXT_DIM)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter rescan  Esc close",
        theme::TEXT_DIM,
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Inspect ")
        .style(theme::OVERLAY_BG);
    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
