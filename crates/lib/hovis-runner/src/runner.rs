use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::mpsc::{Receiver, SyncSender};
use std::time::Duration;
use std::{io, thread};

use crossterm::event::{self, Event as CrosstermEvent};
use log::{error, info};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use hovis_core::bucket::{Bucket, TimeMS};
use hovis_core::scheduler::Scheduler;
use hovis_output::terminal::{handle_sim_key_events, TerminalUI};
use hovis_output::ui::{Message, ProgressUpdate, Renderer, SimContent, SimUIMetadata};

/// Simulated time between two progress reports.
const PROGRESS_STEP: u64 = 500;

fn progress_of<B: Bucket, S: Scheduler<B>>(scheduler: &S, now: u64) -> ProgressUpdate {
    ProgressUpdate {
        now,
        pending_events: scheduler.pending(),
        delivered_events: scheduler.delivered(),
    }
}

/// Runs the scheduler to its stop time on the calling thread.
pub fn run_headless<B, S>(mut scheduler: S) -> TimeMS
where
    S: Scheduler<B>,
    B: Bucket,
{
    let end_time = scheduler.duration().as_u64();
    let mut now = 0;
    let mut next_report = 10_000;
    scheduler.initialize();
    while now < end_time {
        now = scheduler.trigger().as_u64();
        if now >= next_report {
            info!(
                "Simulated {} ms, {} events pending",
                now,
                scheduler.pending()
            );
            next_report += 10_000;
        }
    }
    scheduler.terminate();
    TimeMS::from(now)
}

/// Runs the scheduler on a worker thread while a progress screen is drawn on stderr. Quitting
/// the screen stops the run early.
pub fn run_simulation<B, S, R>(mut scheduler: S, metadata: SimUIMetadata, renderer: R)
where
    S: Scheduler<B>,
    B: Bucket,
    R: Renderer,
{
    let (sender_ui, receiver_ui) = mpsc::sync_channel(0);
    let poller_sender = sender_ui.clone();
    let duration = scheduler.duration().as_u64();
    let polling = AtomicBool::new(true);

    thread::scope(|s| {
        s.spawn(move || {
            add_event_listener(receiver_ui, duration, metadata, renderer);
        });

        let polling = &polling;
        s.spawn(move || {
            while polling.load(Ordering::Relaxed) {
                if !add_event_poller(&poller_sender) {
                    break;
                }
            }
        });

        s.spawn(move || {
            let mut now = 0;
            let mut next_report = 0;
            scheduler.initialize();
            while now < duration {
                now = scheduler.trigger().as_u64();
                if now >= next_report {
                    next_report = now + PROGRESS_STEP;
                    let update = progress_of::<B, S>(&scheduler, now);
                    if sender_ui.send(Message::Progress(update)).is_err() {
                        info!("Progress screen closed at {} ms, stopping the run", now);
                        break;
                    }
                }
            }
            polling.store(false, Ordering::Relaxed);
            scheduler.terminate();
            let _ = sender_ui.send(Message::Quit);
        });
    });
}

pub fn add_event_listener<R: Renderer>(
    receiver_ui: Receiver<Message>,
    duration: u64,
    metadata: SimUIMetadata,
    renderer: R,
) {
    let mut ui_content = SimContent::new(duration, metadata);
    let terminal = match Terminal::new(CrosstermBackend::new(io::stderr())) {
        Ok(terminal) => terminal,
        Err(e) => {
            error!("Failed to create the terminal: {}", e);
            return;
        }
    };
    let mut tui = TerminalUI::new(terminal, renderer);
    if let Err(e) = tui.init() {
        error!("Failed to initialize the terminal: {}", e);
        return;
    }

    while ui_content.running {
        if let Err(e) = tui.draw_ui(&mut ui_content) {
            error!("Failed to draw the progress screen: {}", e);
            break;
        }
        match receiver_ui.recv() {
            Ok(Message::Progress(update)) => ui_content.update(update),
            Ok(Message::Key(key_event)) => handle_sim_key_events(key_event, &mut ui_content),
            Ok(Message::Resize(_, _)) => {}
            Ok(Message::Quit) | Err(_) => ui_content.quit(),
        }
    }
    if let Err(e) = tui.exit() {
        error!("Failed to restore the terminal: {}", e);
    }
}

/// Forwards one terminal event, if any arrives within the poll interval. Returns false once
/// the screen no longer listens.
pub fn add_event_poller(sender: &SyncSender<Message>) -> bool {
    let tick_rate = Duration::from_millis(250);
    match event::poll(tick_rate) {
        Ok(true) => {}
        Ok(false) => return true,
        Err(_) => return false,
    }
    let message = match event::read() {
        Ok(CrosstermEvent::Key(e)) => Message::Key(e),
        Ok(CrosstermEvent::Resize(w, h)) => Message::Resize(w, h),
        Ok(_) => return true,
        Err(_) => return false,
    };
    sender.send(message).is_ok()
}
