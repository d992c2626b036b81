//! Component model with change-tracking headers.
//!
//! Components carry two header snapshots: what the application set
//! (`current`) and what was last put on the wire (`sent`). An add
//! message carries every current header, a modify message carries
//! only the difference, and no difference means no message at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::event::{EventKind, HandlerRef};
use crate::message::{header, Message};
use crate::util::lowest_free_id;

pub mod attributes;
pub mod selection;
pub mod widgets;

pub use attributes::{AttributeClass, AttributeRange, AttributeTrack, AttributeValue};
pub use selection::{Presentation, Selection, SelectionItem, SelectionMode};
pub use widgets::{Button, Label, Panel, TextField, Window};

// ── Wire names ───────────────────────────────────────────────────

/// Component type, the value of the `component` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Button,
    Label,
    Panel,
    Selection,
    TextField,
    Window,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Button => "button",
            ComponentKind::Label => "label",
            ComponentKind::Panel => "panel",
            ComponentKind::Selection => "selection",
            ComponentKind::TextField => "textfield",
            ComponentKind::Window => "window",
        }
    }
}

/// Values of the `events` header controlling client-side reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsValue {
    Enabled,
    Disabled,
    Unselect,
    Server,
}

impl EventsValue {
    pub fn as_str(self) -> &'static str {
        match self {
            EventsValue::Enabled => "enabled",
            EventsValue::Disabled => "disabled",
            EventsValue::Unselect => "unselect",
            EventsValue::Server => "server",
        }
    }
}

/// One axis of the `text-direction` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    Left,
    Right,
    Up,
    Down,
}

impl TextDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TextDirection::Left => "left",
            TextDirection::Right => "right",
            TextDirection::Up => "up",
            TextDirection::Down => "down",
        }
    }
}

// ── Shadow ───────────────────────────────────────────────────────

/// Current and last-sent header snapshots for one component.
#[derive(Debug, Default, Clone)]
pub struct Shadow {
    current: BTreeMap<&'static str, String>,
    sent: BTreeMap<&'static str, String>,
}

impl Shadow {
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.current.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.current.get(key).map(String::as_str)
    }

    /// Headers whose current value differs from what was last sent.
    pub fn changed(&self) -> Vec<(&'static str, String)> {
        self.current
            .iter()
            .filter(|(key, value)| self.sent.get(*key) != Some(*value))
            .map(|(key, value)| (*key, value.clone()))
            .collect()
    }

    /// Every current header, for an add message.
    pub fn all(&self) -> Vec<(&'static str, String)> {
        self.current
            .iter()
            .map(|(key, value)| (*key, value.clone()))
            .collect()
    }

    /// Record that current state is now on the wire.
    pub fn mark_sent(&mut self) {
        self.sent = self.current.clone();
    }

    /// Record a value as both current and sent, for state learned
    /// from a client event rather than set by the application.
    pub fn set_sent_eq(&mut self, key: &'static str, value: impl Into<String>) {
        let value = value.into();
        self.current.insert(key, value.clone());
        self.sent.insert(key, value);
    }
}

// ── ComponentBase ────────────────────────────────────────────────

/// State shared by every component type.
pub struct ComponentBase {
    kind: ComponentKind,
    id: Option<u32>,
    /// Serial of the session this component was added to.
    session: Option<u64>,
    shadow: Shadow,
    handlers: HashMap<EventKind, HandlerRef>,
}

impl ComponentBase {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            id: None,
            session: None,
            shadow: Shadow::default(),
            handlers: HashMap::new(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn session(&self) -> Option<u64> {
        self.session
    }

    pub(crate) fn attach(&mut self, id: u32, session: u64) {
        self.id = Some(id);
        self.session = Some(session);
    }

    pub(crate) fn detach(&mut self) {
        self.id = None;
        self.session = None;
    }

    pub fn shadow(&self) -> &Shadow {
        &self.shadow
    }

    pub fn shadow_mut(&mut self) -> &mut Shadow {
        &mut self.shadow
    }

    pub fn set_parent_id(&mut self, parent_id: u32) {
        self.shadow.set(header::PARENT, parent_id.to_string());
    }

    pub fn set_position(&mut self, horizontal: u32, vertical: u32) {
        self.shadow
            .set(header::POSITION, format!("{},{}", horizontal, vertical));
    }

    pub fn set_size(&mut self, horizontal: u32, vertical: u32) {
        self.shadow
            .set(header::SIZE, format!("{},{}", horizontal, vertical));
    }

    pub fn set_events(&mut self, events: EventsValue) {
        self.shadow.set(header::EVENTS, events.as_str());
    }

    pub fn set_handler(&mut self, kind: EventKind, handler: HandlerRef) {
        self.handlers.insert(kind, handler);
    }

    pub fn handler(&self, kind: EventKind) -> Option<HandlerRef> {
        self.handlers.get(&kind).cloned()
    }
}

// ── Component trait ──────────────────────────────────────────────

/// A GUI component the session can add, modify, and remove.
pub trait Component: Send {
    fn base(&self) -> &ComponentBase;

    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Child components added before this one was, sent to the
    /// client right after it.
    fn children(&self) -> Vec<SharedComponent> {
        Vec::new()
    }

    /// React to an inbound event targeting this component and pick
    /// the handler for it. Widgets that carry client-editable state
    /// sync it here before handlers run.
    fn on_event(&mut self, kind: EventKind, _message: &Message) -> Option<HandlerRef> {
        self.base().handler(kind)
    }
}

pub type SharedComponent = Arc<Mutex<dyn Component>>;

// ── ComponentTable ───────────────────────────────────────────────

/// Id-keyed table of the components added to one session.
#[derive(Default)]
pub struct ComponentTable {
    map: BTreeMap<u32, SharedComponent>,
}

impl ComponentTable {
    /// Insert under the lowest free id and return it.
    pub fn insert(&mut self, component: SharedComponent) -> u32 {
        let id = lowest_free_id(&self.map);
        self.map.insert(id, component);
        id
    }

    pub fn get(&self, id: u32) -> Option<SharedComponent> {
        self.map.get(&id).cloned()
    }

    pub fn remove(&mut self, id: u32) -> Option<SharedComponent> {
        self.map.remove(&id)
    }

    /// Take every component out, highest id first so children go
    /// before their parents.
    pub fn drain(&mut self) -> Vec<(u32, SharedComponent)> {
        let mut all: Vec<(u32, SharedComponent)> = std::mem::take(&mut self.map)
            .into_iter()
            .collect();
        all.reverse();
        all
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        base: ComponentBase,
    }

    impl Plain {
        fn new() -> Self {
            Self {
                base: ComponentBase::new(ComponentKind::Panel),
            }
        }
    }

    impl Component for Plain {
        fn base(&self) -> &ComponentBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }
    }

    #[test]
    fn shadow_diff_is_minimal() {
        let mut shadow = Shadow::default();
        shadow.set(header::POSITION, "1,2");
        shadow.set(header::SIZE, "3,4");
        assert_eq!(shadow.changed().len(), 2);

        shadow.mark_sent();
        assert!(shadow.changed().is_empty());

        shadow.set(header::POSITION, "5,6");
        assert_eq!(shadow.changed(), vec![(header::POSITION, "5,6".to_string())]);

        // Setting the sent value back is not a change.
        shadow.set(header::POSITION, "5,6");
        shadow.mark_sent();
        shadow.set(header::POSITION, "5,6");
        assert!(shadow.changed().is_empty());
    }

    #[test]
    fn set_sent_eq_never_diffs() {
        let mut shadow = Shadow::default();
        shadow.set_sent_eq(header::CONTENT, "typed by client");
        assert!(shadow.changed().is_empty());
        assert_eq!(shadow.get(header::CONTENT), Some("typed by client"));
    }

    #[test]
    fn table_reuses_lowest_free_id() {
        let mut table = ComponentTable::default();
        let a = table.insert(Arc::new(Mutex::new(Plain::new())));
        let b = table.insert(Arc::new(Mutex::new(Plain::new())));
        let c = table.insert(Arc::new(Mutex::new(Plain::new())));
        assert_eq!((a, b, c), (0, 1, 2));

        table.remove(1);
        let d = table.insert(Arc::new(Mutex::new(Plain::new())));
        assert_eq!(d, 1);

        let e = table.insert(Arc::new(Mutex::new(Plain::new())));
        assert_eq!(e, 3);
    }

    #[test]
    fn drain_yields_children_first() {
        let mut table = ComponentTable::default();
        table.insert(Arc::new(Mutex::new(Plain::new())));
        table.insert(Arc::new(Mutex::new(Plain::new())));
        table.insert(Arc::new(Mutex::new(Plain::new())));
        let ids: Vec<u32> = table.drain().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 1, 0]);
        assert!(table.is_empty());
    }

    #[test]
    fn base_setters_fill_shadow() {
        let mut plain = Plain::new();
        plain.base_mut().set_position(2, 3);
        plain.base_mut().set_size(10, 1);
        plain.base_mut().set_events(EventsValue::Disabled);
        let shadow = plain.base().shadow();
        assert_eq!(shadow.get(header::POSITION), Some("2,3"));
        assert_eq!(shadow.get(header::SIZE), Some("10,1"));
        assert_eq!(shadow.get(header::EVENTS), Some("disabled"));
    }
}
