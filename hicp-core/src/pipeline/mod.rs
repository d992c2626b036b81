//! Per-connection worker tasks.
//!
//! Each connection runs five tasks: a reader turning wire frames
//! into events, a writer draining outbound messages, a timer firing
//! scheduled handlers, the event task running the connection state
//! machine plus the feedback and update stages, and a process task
//! running the long-work stage off to the side.

use std::time::Duration;

use tokio::time::Instant;

use crate::event::HandlerRef;
use crate::message::Message;

mod event;
mod process;
mod read;
mod time;
mod write;

pub(crate) use event::EventWorker;
pub(crate) use process::run_processor;
pub(crate) use read::run_reader;
pub(crate) use time::run_timer;
pub(crate) use write::run_writer;

/// Outbound channel item for the writer task.
#[derive(Debug)]
pub(crate) enum WriteCommand {
    Message(Message),
    /// Flush and stop.
    Shutdown,
}

/// Control channel item for the timer task.
#[derive(Debug)]
pub(crate) enum TimeCommand {
    /// Timer set changed, recompute the next deadline.
    Wake,
    Disconnect,
}

/// One scheduled handler.
pub(crate) struct TimeEntry {
    pub handler: HandlerRef,
    pub deadline: Instant,
    /// Rescheduling interval, absent for one-shot timers.
    pub repeat: Option<Duration>,
}
