//! Timer task: fires scheduled handlers as time events.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::event::Event;
use crate::pipeline::{TimeCommand, TimeEntry};

pub(crate) type TimerTable = Arc<Mutex<BTreeMap<u32, TimeEntry>>>;

/// Sleep until the earliest deadline, fire everything due, repeat.
/// A `Wake` arrives whenever the timer set changes so the deadline
/// can be recomputed.
pub(crate) async fn run_timer(
    timers: TimerTable,
    mut rx: mpsc::UnboundedReceiver<TimeCommand>,
    event_tx: mpsc::UnboundedSender<Event>,
) {
    loop {
        let next_deadline = match timers.lock() {
            Ok(table) => table.values().map(|entry| entry.deadline).min(),
            Err(_) => return,
        };

        match next_deadline {
            Some(deadline) => match timeout_at(deadline, rx.recv()).await {
                Ok(Some(TimeCommand::Wake)) => continue,
                Ok(Some(TimeCommand::Disconnect)) | Ok(None) => return,
                Err(_) => {
                    // Deadline reached.
                    let due = collect_due(&timers, Instant::now());
                    for event in due {
                        if event_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
            },
            None => match rx.recv().await {
                Some(TimeCommand::Wake) => continue,
                Some(TimeCommand::Disconnect) | None => return,
            },
        }
    }
}

/// Pull out every due entry, rescheduling repeating ones.
fn collect_due(timers: &TimerTable, now: Instant) -> Vec<Event> {
    let mut due = Vec::new();
    let Ok(mut table) = timers.lock() else {
        return due;
    };
    let expired: Vec<u32> = table
        .iter()
        .filter(|(_, entry)| entry.deadline <= now)
        .map(|(id, _)| *id)
        .collect();
    for id in expired {
        if let Some(entry) = table.get_mut(&id) {
            due.push(Event::timed(entry.handler.clone()));
            match entry.repeat {
                Some(interval) => entry.deadline = now + interval,
                None => {
                    table.remove(&id);
                }
            }
        }
    }
    due
}
