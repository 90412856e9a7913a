//! Sort, filter and paging state for the device list.

use crate::filter::{Filter, FilterError};
use crate::model::DeviceRecord;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::Instant;

const HISTORY_LIMIT: usize = 20;

/// Column the device list is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Ip,
    Hostname,
    Mac,
    Vendor,
    Device,
    Rtt,
    FirstSeen,
    Uptime,
    Flaps,
}

impl SortKey {
    /// Keyboard shortcut mapping
    pub fn from_key(c: char) -> Option<Self> {
        Some(match c {
            'i' => Self::Ip,
            'h' => Self::Hostname,
            'm' => Self::Mac,
            'v' => Self::Vendor,
            'd' => Self::Device,
            'r' => Self::Rtt,
            't' => Self::FirstSeen,
            'u' => Self::Uptime,
            'f' => Self::Flaps,
            _ => return None,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Hostname => "Hostname",
            Self::Mac => "MAC",
            Self::Vendor => "Vendor",
            Self::Device => "Device",
            Self::Rtt => "RTT",
            Self::FirstSeen => "First Seen",
            Self::Uptime => "Uptime",
            Self::Flaps => "Flaps",
        }
    }

    fn compare(&self, a: &DeviceRecord, b: &DeviceRecord, reference: Instant) -> Ordering {
        let text = |x: &str, y: &str| x.to_lowercase().cmp(&y.to_lowercase());
        let opt = |x: &Option<String>, y: &Option<String>| {
            text(x.as_deref().unwrap_or(""), y.as_deref().unwrap_or(""))
        };
        let primary = match self {
            Self::Ip => a.ip.cmp(&b.ip),
            Self::Hostname => text(&a.hostname, &b.hostname),
            Self::Mac => opt(&a.mac, &b.mac),
            Self::Vendor => opt(&a.vendor, &b.vendor),
            Self::Device => a.device_type.label().cmp(b.device_type.label()),
            // unknown RTT sorts after every measured one
            Self::Rtt => match (a.rtt, b.rtt) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Self::FirstSeen => a.first_seen.cmp(&b.first_seen),
            Self::Uptime => a.uptime(reference).cmp(&b.uptime(reference)),
            Self::Flaps => a.flaps.cmp(&b.flaps),
        };
        primary.then_with(|| a.ip.cmp(&b.ip))
    }
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub sort: SortKey,
    pub descending: bool,
    filter: Filter,
    filter_error: Option<String>,
    history: VecDeque<String>,
    /// Index into the filtered, sorted list
    selected: usize,
    page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            sort: SortKey::Ip,
            descending: false,
            filter: Filter::default(),
            filter_error: None,
            history: VecDeque::new(),
            selected: 0,
            page_size: 20,
        }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by `key`; choosing the current key again flips the direction
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort == key {
            self.descending = !self.descending;
        } else {
            self.sort = key;
            self.descending = false;
        }
    }

    /// Install a new filter. On error the previous filter stays active and
    /// the message is kept for display.
    pub fn apply_filter(&mut self, text: &str) -> Result<(), FilterError> {
        match Filter::parse(text) {
            Ok(filter) => {
                if !filter.is_empty() {
                    self.remember(filter.text().to_string());
                }
                self.filter = filter;
                self.filter_error = None;
                self.selected = 0;
                Ok(())
            }
            Err(e) => {
                self.filter_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn clear_filter(&mut self) {
        self.filter = Filter::default();
        self.filter_error = None;
        self.selected = 0;
    }

    fn remember(&mut self, text: String) {
        self.history.retain(|h| *h != text);
        self.history.push_front(text);
        self.history.truncate(HISTORY_LIMIT);
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn filter_error(&self) -> Option<&str> {
        self.filter_error.as_deref()
    }

    /// Most recent first
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Rows that pass the filter, in display order
    pub fn rows<'a>(&self, devices: &'a [DeviceRecord], reference: Instant) -> Vec<&'a DeviceRecord> {
        let mut rows: Vec<&DeviceRecord> = devices.iter().filter(|d| self.filter.matches(d)).collect();
        rows.sort_by(|a, b| {
            let ord = self.sort.compare(a, b, reference);
            if self.descending {
                ord.reverse()
            } else {
                ord
            }
        });
        rows
    }

    /// Rows per page from the terminal height minus `chrome` fixed lines
    pub fn set_viewport(&mut self, height: u16, chrome: u16) {
        self.page_size = usize::from(height.saturating_sub(chrome)).max(1);
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    pub fn page(&self, total: usize) -> usize {
        (self.clamped(total) / self.page_size).min(self.page_count(total) - 1)
    }

    /// Index range of the current page inside the filtered list
    pub fn page_range(&self, total: usize) -> std::ops::Range<usize> {
        let start = self.page(total) * self.page_size;
        start..(start + self.page_size).min(total)
    }

    /// Selected index, clamped to the list
    pub fn selected(&self, total: usize) -> Option<usize> {
        (total > 0).then(|| self.clamped(total))
    }

    fn clamped(&self, total: usize) -> usize {
        self.selected.min(total.saturating_sub(1))
    }

    pub fn next_page(&mut self, total: usize) {
        let page = (self.page(total) + 1).min(self.page_count(total) - 1);
        self.selected = (page * self.page_size).min(total.saturating_sub(1));
    }

    pub fn prev_page(&mut self, total: usize) {
        let page = self.page(total).saturating_sub(1);
        self.selected = page * self.page_size;
    }

    pub fn select_up(&mut self, total: usize) {
        self.selected = self.clamped(total).saturating_sub(1);
    }

    pub fn select_down(&mut self, total: usize) {
        self.selected = (self.clamped(total) + 1).min(total.saturating_sub(1));
    }

    pub fn select_page_up(&mut self, total: usize) {
        self.selected = self.clamped(total).saturating_sub(self.page_size);
    }

    pub fn select_page_down(&mut self, total: usize) {
        self.selected = (self.clamped(total) + self.page_size).min(total.saturating_sub(1));
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self, total: usize) {
        self.selected = total.saturating_sub(1);
    }
}
