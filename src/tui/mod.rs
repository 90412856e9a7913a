//! Interactive monitor for `watch`.
//!
//! The scheduler publishes snapshots and events; this loop merges them with
//! keyboard input and inspector progress and redraws after each one.

mod app;
mod event;
mod render;
mod terminal;
mod theme;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::budget::BudgetLimiter;
use crate::inspect::HostInspector;
use crate::scheduler::SchedulerHandle;

pub use app::{Action, App, Banner, Mode};
pub use event::{AppEvent, InspectUpdate};
use terminal::TerminalGuard;

const TICK: Duration = Duration::from_secs(1);
const INSPECT_PROGRESS_BUFFER: usize = 32;

/// Run the monitor until the user quits or `cancel` fires. Cancels `cancel`
/// on the way out so the scheduler stops too.
pub async fn run_watch(
    handle: SchedulerHandle,
    inspector: HostInspector,
    limits: BudgetLimiter,
    banner: Banner,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let _guard = TerminalGuard::setup()?;
    let mut term = terminal::create_terminal()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let keyboard = event::spawn_keyboard(tx.clone(), cancel.clone());

    let SchedulerHandle {
        mut snapshots,
        mut events,
    } = handle;
    let initial = snapshots.borrow_and_update().clone();
    let mut app = App::new(banner, initial, limits, cancel.clone());

    let mut tick = tokio::time::interval(TICK);
    let mut events_open = true;
    let mut snapshots_open = true;

    let result = loop {
        if let Err(e) = term.draw(|frame| render::draw(frame, &mut app)) {
            break Err(e.into());
        }

        tokio::select! {
            Some(event) = rx.recv() => match event {
                AppEvent::Key(key) => {
                    if let Some(action) = app.handle_key(key) {
                        spawn_inspection(&inspector, action, tx.clone());
                    }
                }
                AppEvent::Resize(_, _) => {}
                AppEvent::Inspect(generation, update) => app.on_inspect(generation, update),
            },
            event = events.recv(), if events_open => match event {
                Some(event) => app.on_scan_event(event),
                None => events_open = false,
            },
            changed = snapshots.changed(), if snapshots_open => match changed {
                Ok(()) => {
                    let snapshot = snapshots.borrow_and_update().clone();
                    app.on_snapshot(snapshot);
                }
                Err(_) => snapshots_open = false,
            },
            _ = tick.tick() => app.on_tick(),
            _ = cancel.cancelled() => app.should_quit = true,
        }

        if app.should_quit {
            break Ok(());
        }
    };

    cancel.cancel();
    drop(term);
    if tokio::task::spawn_blocking(move || keyboard.join()).await.is_err() {
        debug!("keyboard reader did not shut down cleanly");
    }
    result
}

/// Probe the inspected host on a separate task, forwarding every result to
/// the UI loop as it arrives.
fn spawn_inspection(
    inspector: &HostInspector,
    action: Action,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    let Action::Inspect {
        generation,
        record,
        tokens,
        cancel,
    } = action;
    let inspector = inspector.clone();

    tokio::spawn(async move {
        let (progress_tx, mut progress_rx) = mpsc::channel(INSPECT_PROGRESS_BUFFER);
        let forward_tx = tx.clone();
        let forward = async move {
            while let Some(result) = progress_rx.recv().await {
                let update = AppEvent::Inspect(generation, InspectUpdate::Result(result));
                if forward_tx.send(update).is_err() {
                    break;
                }
            }
        };
        let scan = inspector.scan_ports(record.ip, &tokens, Some(progress_tx), &cancel);
        let dns = async {
            tokio::select! {
                dns = inspector.dns_consistency(&record) => Some(dns),
                _ = cancel.cancelled() => None,
            }
        };

        let (results, (), dns) = tokio::join!(scan, forward, dns);
        if cancel.is_cancelled() {
            return;
        }
        if let Some(dns) = dns {
            let _ = tx.send(AppEvent::Inspect(generation, InspectUpdate::Dns(dns)));
        }
        let _ = tx.send(AppEvent::Inspect(generation, InspectUpdate::Done(results)));
    });
}
