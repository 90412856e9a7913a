//! UI state and key handling for watch mode.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio_util::sync::CancellationToken;

use crate::budget::BudgetLimiter;
use crate::constants::DEFAULT_INSPECT_SPEC;
use crate::inspect::{order_results, parse_port_spec, DnsConsistency, PortToken, ProbeResult};
use crate::model::DeviceRecord;
use crate::scheduler::ScanEvent;
use crate::store::StoreSnapshot;
use crate::view::{SortKey, ViewState};

use super::event::InspectUpdate;

/// How long a notice stays in the status line
const NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    FilterInput,
    Help,
    Inspector,
}

/// Work the UI loop has to carry out on behalf of a key press
#[derive(Debug)]
pub enum Action {
    Inspect {
        generation: u64,
        record: DeviceRecord,
        tokens: Vec<PortToken>,
        cancel: CancellationToken,
    },
}

pub struct InspectorState {
    pub ip: Ipv4Addr,
    pub record: DeviceRecord,
    pub spec: String,
    pub results: Vec<ProbeResult>,
    pub running: bool,
    pub error: Option<String>,
    pub dns: Option<DnsConsistency>,
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl InspectorState {
    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.running = false;
    }
}

/// Header facts that do not change while the monitor runs
#[derive(Debug, Clone)]
pub struct Banner {
    pub network: String,
    pub strategy: &'static str,
    pub interval: Duration,
}

pub struct App {
    pub banner: Banner,
    pub snapshot: Arc<StoreSnapshot>,
    pub view: ViewState,
    pub mode: Mode,
    pub filter_input: String,
    history_cursor: Option<usize>,
    pub inspector: Option<InspectorState>,
    pub scanning: bool,
    pub last_scan: Option<(u64, Duration)>,
    notice: Option<(String, Instant)>,
    pub should_quit: bool,
    generation: u64,
    limits: BudgetLimiter,
    cancel: CancellationToken,
}

impl App {
    pub fn new(
        banner: Banner,
        snapshot: Arc<StoreSnapshot>,
        limits: BudgetLimiter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            banner,
            snapshot,
            view: ViewState::new(),
            mode: Mode::Normal,
            filter_input: String::new(),
            history_cursor: None,
            inspector: None,
            scanning: false,
            last_scan: None,
            notice: None,
            should_quit: false,
            generation: 0,
            limits,
            cancel,
        }
    }

    /// Rows currently visible through the filter, in display order
    pub fn rows(&self) -> Vec<&DeviceRecord> {
        self.view.rows(&self.snapshot.devices, Instant::now())
    }

    pub fn active_resolvers(&self) -> usize {
        self.limits.active_resolvers()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn flash(&mut self, text: impl Into<String>) {
        self.notice = Some((text.into(), Instant::now()));
    }

    pub fn on_tick(&mut self) {
        if self.notice.as_ref().is_some_and(|(_, at)| at.elapsed() >= NOTICE_TTL) {
            self.notice = None;
        }
    }

    pub fn on_snapshot(&mut self, snapshot: Arc<StoreSnapshot>) {
        if let Some(inspector) = self.inspector.as_mut() {
            if let Some(record) = snapshot.get(inspector.ip) {
                inspector.record = record.clone();
            }
        }
        self.snapshot = snapshot;
    }

    pub fn on_scan_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::ScanStarted { .. } => self.scanning = true,
            ScanEvent::ScanFinished { scan, elapsed, .. } => {
                self.scanning = false;
                self.last_scan = Some((scan, elapsed));
            }
            ScanEvent::HostnamesResolved { resolved } => {
                self.flash(format!("{} hostname(s) resolved", resolved));
            }
            ScanEvent::ReachabilityRefreshed { .. } => {}
            ScanEvent::Notice(text) => self.flash(text),
        }
    }

    pub fn on_inspect(&mut self, generation: u64, update: InspectUpdate) {
        let Some(inspector) = self.inspector.as_mut() else { return };
        if inspector.generation != generation {
            return;
        }
        match update {
            InspectUpdate::Result(result) => {
                inspector.results.push(result);
                order_results(&mut inspector.results, false);
            }
            InspectUpdate::Done(results) => {
                inspector.results = results;
                order_results(&mut inspector.results, true);
                inspector.running = false;
                inspector.cancel = None;
            }
            InspectUpdate::Dns(dns) => inspector.dns = Some(dns),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }
        match self.mode {
            Mode::Normal => self.handle_normal(key),
            Mode::FilterInput => {
                self.handle_filter_input(key);
                None
            }
            Mode::Help => {
                self.mode = Mode::Normal;
                None
            }
            Mode::Inspector => self.handle_inspector(key),
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) -> Option<Action> {
        let total = self.rows().len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.mode = Mode::Help,
            KeyCode::Char('/') => {
                self.mode = Mode::FilterInput;
                self.filter_input = self.view.filter().text().to_string();
                self.history_cursor = None;
            }
            KeyCode::Char('c') => {
                self.view.clear_filter();
                self.filter_input.clear();
            }
            KeyCode::Char('n') => self.view.next_page(total),
            KeyCode::Char('p') => self.view.prev_page(total),
            KeyCode::Char(c) => {
                if let Some(key) = SortKey::from_key(c) {
                    self.view.toggle_sort(key);
                }
            }
            KeyCode::Up => self.view.select_up(total),
            KeyCode::Down => self.view.select_down(total),
            KeyCode::PageUp => self.view.select_page_up(total),
            KeyCode::PageDown => self.view.select_page_down(total),
            KeyCode::Home => self.view.select_first(),
            KeyCode::End => self.view.select_last(total),
            KeyCode::Enter => return self.open_inspector(),
            _ => {}
        }
        None
    }

    fn handle_filter_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => {
                if self.view.apply_filter(&self.filter_input).is_ok() {
                    self.mode = Mode::Normal;
                }
            }
            KeyCode::Backspace => {
                self.filter_input.pop();
            }
            KeyCode::Up => self.recall_history(1),
            KeyCode::Down => self.recall_history(-1),
            KeyCode::Char(c) => self.filter_input.push(c),
            _ => {}
        }
    }

    /// Step through filter history; positive is older
    fn recall_history(&mut self, step: isize) {
        let history: Vec<String> = self.view.history().map(str::to_string).collect();
        if history.is_empty() {
            return;
        }
        let next = match (self.history_cursor, step > 0) {
            (None, true) => Some(0),
            (None, false) => None,
            (Some(i), true) => Some((i + 1).min(history.len() - 1)),
            (Some(0), false) => None,
            (Some(i), false) => Some(i - 1),
        };
        self.history_cursor = next;
        self.filter_input = next.map(|i| history[i].clone()).unwrap_or_default();
    }

    fn open_inspector(&mut self) -> Option<Action> {
        let rows = self.rows();
        let index = self.view.selected(rows.len())?;
        let record = rows[index].clone();
        self.inspector = Some(InspectorState {
            ip: record.ip,
            record,
            spec: DEFAULT_INSPECT_SPEC.to_string(),
            results: Vec::new(),
            running: false,
            error: None,
            dns: None,
            generation: 0,
            cancel: None,
        });
        self.mode = Mode::Inspector;
        self.start_inspection()
    }

    fn handle_inspector(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => {
                if let Some(mut inspector) = self.inspector.take() {
                    inspector.stop();
                }
                self.mode = Mode::Normal;
                None
            }
            KeyCode::Enter => self.start_inspection(),
            KeyCode::Backspace => {
                if let Some(inspector) = self.inspector.as_mut() {
                    inspector.spec.pop();
                }
                None
            }
            KeyCode::Char(c) => {
                if let Some(inspector) = self.inspector.as_mut() {
                    inspector.spec.push(c);
                }
                None
            }
            _ => None,
        }
    }

    fn start_inspection(&mut self) -> Option<Action> {
        self.generation += 1;
        let generation = self.generation;
        let inspector = self.inspector.as_mut()?;
        inspector.stop();
        let tokens = match parse_port_spec(&inspector.spec) {
            Ok(tokens) => tokens,
            Err(e) => {
                inspector.error = Some(e.to_string());
                return None;
            }
        };
        let cancel = self.cancel.child_token();
        inspector.error = None;
        inspector.results.clear();
        inspector.dns = None;
        inspector.running = true;
        inspector.generation = generation;
        inspector.cancel = Some(cancel.clone());
        Some(Action::Inspect {
            generation,
            record: inspector.record.clone(),
            tokens,
            cancel,
        })
    }
}
