//! Events consumed by the UI loop and the keyboard reader thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::inspect::{DnsConsistency, ProbeResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Progress of one inspector run, tagged with the run's generation
#[derive(Debug)]
pub enum InspectUpdate {
    Result(ProbeResult),
    Done(Vec<ProbeResult>),
    Dns(DnsConsistency),
}

#[derive(Debug)]
pub enum AppEvent {
    /// Key press (releases and repeats are filtered out)
    Key(KeyEvent),
    Resize(u16, u16),
    Inspect(u64, InspectUpdate),
}

/// Read keyboard input on a dedicated thread until `cancel` fires or the
/// receiving side goes away.
pub fn spawn_keyboard(
    tx: mpsc::UnboundedSender<AppEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !cancel.is_cancelled() {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(_) => break,
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => tx.send(AppEvent::Key(key)),
                Ok(Event::Resize(w, h)) => tx.send(AppEvent::Resize(w, h)),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        }
    })
}
