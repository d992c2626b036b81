//! List selection component.
//!
//! Items are carried in the `items` header, one per line in the form
//! `id: text=<text id>[, events=<state>]`. The current choice rides
//! the `selected` header as a comma-separated id list.

use std::ops::{Deref, DerefMut};

use crate::component::{Component, ComponentBase, ComponentKind, EventsValue};
use crate::event::{EventKind, HandlerRef};
use crate::message::{header, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Single,
    Multiple,
}

impl SelectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMode::Single => "single",
            SelectionMode::Multiple => "multiple",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Scroll,
    Toggle,
    Dropdown,
}

impl Presentation {
    pub fn as_str(self) -> &'static str {
        match self {
            Presentation::Scroll => "scroll",
            Presentation::Toggle => "toggle",
            Presentation::Dropdown => "dropdown",
        }
    }
}

/// One selectable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionItem {
    pub id: u32,
    pub text_id: u32,
    /// Per-item event reporting override, absent for the default.
    pub events: Option<EventsValue>,
}

impl SelectionItem {
    pub fn new(id: u32, text_id: u32) -> Self {
        Self {
            id,
            text_id,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventsValue) -> Self {
        self.events = Some(events);
        self
    }

    fn encode(&self) -> String {
        match self.events {
            Some(events) => format!(
                "{}: text={}, events={}",
                self.id,
                self.text_id,
                events.as_str()
            ),
            None => format!("{}: text={}", self.id, self.text_id),
        }
    }
}

// ── Selection ────────────────────────────────────────────────────

pub struct Selection {
    base: ComponentBase,
    items: Vec<SelectionItem>,
    selected: Vec<u32>,
}

impl Selection {
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(ComponentKind::Selection),
            items: Vec::new(),
            selected: Vec::new(),
        }
    }

    /// Replace the item list.
    pub fn set_items(&mut self, items: Vec<SelectionItem>) {
        self.items = items;
        let encoded: Vec<String> = self.items.iter().map(SelectionItem::encode).collect();
        self.base
            .shadow_mut()
            .set(header::ITEMS, encoded.join("\r\n"));
    }

    pub fn items(&self) -> &[SelectionItem] {
        &self.items
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.base.shadow_mut().set(header::MODE, mode.as_str());
    }

    pub fn set_presentation(&mut self, presentation: Presentation) {
        self.base
            .shadow_mut()
            .set(header::PRESENTATION, presentation.as_str());
    }

    /// Select items by id from the server side.
    pub fn set_selected(&mut self, selected: Vec<u32>) {
        self.selected = selected;
        let encoded: Vec<String> = self.selected.iter().map(u32::to_string).collect();
        self.base
            .shadow_mut()
            .set(header::SELECTED, encoded.join(", "));
    }

    pub fn selected(&self) -> &[u32] {
        &self.selected
    }

    pub fn set_changed_handler(&mut self, handler: HandlerRef) {
        self.base.set_handler(EventKind::Changed, handler);
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Selection {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn on_event(&mut self, kind: EventKind, message: &Message) -> Option<HandlerRef> {
        if kind == EventKind::Changed {
            if let Some(selected) = message.header(header::SELECTED) {
                self.selected = selected
                    .split(',')
                    .filter_map(|id| id.trim().parse().ok())
                    .collect();
                let encoded: Vec<String> =
                    self.selected.iter().map(u32::to_string).collect();
                self.base
                    .shadow_mut()
                    .set_sent_eq(header::SELECTED, encoded.join(", "));
            }
        }
        self.base.handler(kind)
    }
}

impl Deref for Selection {
    type Target = ComponentBase;
    fn deref(&self) -> &ComponentBase {
        &self.base
    }
}

impl DerefMut for Selection {
    fn deref_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::verb;

    #[test]
    fn items_header_one_per_line() {
        let mut selection = Selection::new();
        selection.set_items(vec![
            SelectionItem::new(0, 7),
            SelectionItem::new(1, 8).with_events(EventsValue::Disabled),
        ]);
        assert_eq!(
            selection.base().shadow().get(header::ITEMS),
            Some("0: text=7\r\n1: text=8, events=disabled")
        );
    }

    #[test]
    fn selected_header_comma_separated() {
        let mut selection = Selection::new();
        selection.set_selected(vec![2, 5]);
        assert_eq!(selection.base().shadow().get(header::SELECTED), Some("2, 5"));
    }

    #[test]
    fn mode_and_presentation_headers() {
        let mut selection = Selection::new();
        selection.set_mode(SelectionMode::Multiple);
        selection.set_presentation(Presentation::Dropdown);
        assert_eq!(selection.base().shadow().get(header::MODE), Some("multiple"));
        assert_eq!(
            selection.base().shadow().get(header::PRESENTATION),
            Some("dropdown")
        );
    }

    #[test]
    fn changed_event_syncs_selection() {
        let mut selection = Selection::new();
        selection.set_selected(vec![0]);
        selection.base_mut().shadow_mut().mark_sent();

        let msg = Message::event(verb::CHANGED).with_header(header::SELECTED, "1, 3");
        selection.on_event(EventKind::Changed, &msg);
        assert_eq!(selection.selected(), &[1, 3]);
        assert!(selection.base().shadow().changed().is_empty());
    }
}
