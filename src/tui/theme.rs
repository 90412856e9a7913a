//! Color constants for the monitor.

use ratatui::style::{Color, Modifier, Style};

pub const HEADER: Style = Style::new().fg(Color::Black).bg(Color::Cyan);
pub const STATUS_BAR: Style = Style::new().fg(Color::White).bg(Color::DarkGray);

pub const ROW_OFFLINE: Style = Style::new().fg(Color::DarkGray);
pub const ROW_SELECTED: Style = Style::new().fg(Color::Black).bg(Color::Cyan);
pub const TABLE_HEADER: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

pub const STATUS_ONLINE: Style = Style::new().fg(Color::Green);
pub const STATUS_OFFLINE: Style = Style::new().fg(Color::Red);

pub const PORT_OPEN: Style = Style::new().fg(Color::Green);
pub const PORT_CLOSED: Style = Style::new().fg(Color::Red);
pub const PORT_FILTERED: Style = Style::new().fg(Color::Yellow);

pub const TEXT_DIM: Style = Style::new().fg(Color::DarkGray);
pub const TEXT_ERROR: Style = Style::new().fg(Color::Red);
pub const TEXT_BOLD: Style = Style::new().add_modifier(Modifier::BOLD);

pub const FOOTER_KEY: Style = Style::new().fg(Color::Yellow);
pub const OVERLAY_BG: Style = Style::new().fg(Color::White).bg(Color::DarkGray);
