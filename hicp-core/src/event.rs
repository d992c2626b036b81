//! Event model and the staged handler trait.
//!
//! Inbound messages, timer expiries, and internal requests all become
//! [`Event`]s flowing through the worker pipeline. A handler declares
//! which stages it implements via [`Stages`]; an event is routed only
//! through the stages its handler asks for.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bitflags::bitflags;

use crate::component::SharedComponent;
use crate::message::{verb, Message};
use crate::session::Session;

bitflags! {
    /// Handler stage capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Stages: u8 {
        const FEEDBACK = 1 << 0;
        const PROCESS = 1 << 1;
        const UPDATE = 1 << 2;
    }
}

/// Stage an event is currently in.
///
/// Feedback gives immediate acknowledgement, process does the real
/// work off the session task, update applies the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Feedback,
    Process,
    Update,
}

// ── EventKind ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Authenticate,
    Changed,
    Click,
    Close,
    Connect,
    Disconnect,
    /// Timer expiry, no wire message.
    Time,
    /// Internal request to swap the running application.
    SwitchApp,
}

impl EventKind {
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            verb::AUTHENTICATE => Some(EventKind::Authenticate),
            verb::CHANGED => Some(EventKind::Changed),
            verb::CLICK => Some(EventKind::Click),
            verb::CLOSE => Some(EventKind::Close),
            verb::CONNECT => Some(EventKind::Connect),
            verb::DISCONNECT => Some(EventKind::Disconnect),
            _ => None,
        }
    }

    /// Whether events of this kind target a component by id.
    pub fn is_component_event(self) -> bool {
        matches!(
            self,
            EventKind::Changed | EventKind::Click | EventKind::Close
        )
    }
}

// ── Event ────────────────────────────────────────────────────────

/// One unit of work for the pipeline.
#[derive(Clone)]
pub struct Event {
    pub stage: Stage,
    pub kind: EventKind,
    /// The wire message, absent for timer and internal events.
    pub message: Option<Message>,
    /// Component the event targets, resolved from the id header.
    pub component: Option<SharedComponent>,
    /// Handler chosen for this event.
    pub handler: Option<HandlerRef>,
    /// When the event entered the pipeline.
    pub fired_at: Instant,
    /// Target application name for a switch request.
    pub app: Option<String>,
}

impl Event {
    pub fn inbound(kind: EventKind, message: Message) -> Self {
        Self {
            stage: Stage::Feedback,
            kind,
            message: Some(message),
            component: None,
            handler: None,
            fired_at: Instant::now(),
            app: None,
        }
    }

    pub fn timed(handler: HandlerRef) -> Self {
        Self {
            stage: Stage::Feedback,
            kind: EventKind::Time,
            message: None,
            component: None,
            handler: Some(handler),
            fired_at: Instant::now(),
            app: None,
        }
    }

    pub fn switch_app(app: Option<String>) -> Self {
        Self {
            stage: Stage::Feedback,
            kind: EventKind::SwitchApp,
            message: None,
            component: None,
            handler: None,
            fired_at: Instant::now(),
            app,
        }
    }

    /// Stages the chosen handler implements, empty when no handler.
    pub fn handler_stages(&self) -> Stages {
        match &self.handler {
            Some(handler) => match handler.lock() {
                Ok(handler) => handler.stages(),
                Err(_) => Stages::empty(),
            },
            None => Stages::empty(),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("stage", &self.stage)
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("has_component", &self.component.is_some())
            .field("has_handler", &self.handler.is_some())
            .field("app", &self.app)
            .finish()
    }
}

// ── EventHandler ─────────────────────────────────────────────────

/// Staged event handler.
///
/// `stages` names which of the three callbacks are meaningful; the
/// pipeline skips stages a handler does not declare. `process` runs
/// on a separate task and must not touch the GUI state, which is what
/// `feedback` and `update` get the session handle for.
pub trait EventHandler: Send {
    fn stages(&self) -> Stages;

    fn feedback(&mut self, _session: &Session, _event: &Event) {}

    fn process(&mut self, _event: &Event) {}

    fn update(&mut self, _session: &Session, _event: &Event) {}
}

pub type HandlerRef = Arc<Mutex<dyn EventHandler>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_map_to_kinds() {
        assert_eq!(EventKind::from_verb("click"), Some(EventKind::Click));
        assert_eq!(EventKind::from_verb("connect"), Some(EventKind::Connect));
        assert_eq!(EventKind::from_verb("add"), None);
    }

    #[test]
    fn component_event_kinds() {
        assert!(EventKind::Changed.is_component_event());
        assert!(EventKind::Click.is_component_event());
        assert!(EventKind::Close.is_component_event());
        assert!(!EventKind::Connect.is_component_event());
        assert!(!EventKind::Time.is_component_event());
    }

    #[test]
    fn stages_combine() {
        let all = Stages::FEEDBACK | Stages::PROCESS | Stages::UPDATE;
        assert!(all.contains(Stages::PROCESS));
        assert!(!Stages::UPDATE.contains(Stages::FEEDBACK));
    }

    #[test]
    fn event_without_handler_has_no_stages() {
        let event = Event::switch_app(None);
        assert!(event.handler_stages().is_empty());
    }
}
