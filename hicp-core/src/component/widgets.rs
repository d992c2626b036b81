//! Concrete component types.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use crate::component::attributes::{AttributeClass, AttributeTrack, AttributeValue};
use crate::component::{Component, ComponentBase, ComponentKind, SharedComponent};
use crate::event::{EventKind, HandlerRef};
use crate::message::{header, Message};

macro_rules! deref_base {
    ($widget:ty) => {
        impl Deref for $widget {
            type Target = ComponentBase;
            fn deref(&self) -> &ComponentBase {
                &self.base
            }
        }
        impl DerefMut for $widget {
            fn deref_mut(&mut self) -> &mut ComponentBase {
                &mut self.base
            }
        }
    };
}

// ── Label ────────────────────────────────────────────────────────

pub struct Label {
    base: ComponentBase,
}

impl Label {
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(ComponentKind::Label),
        }
    }

    pub fn set_text_id(&mut self, text_id: u32) {
        self.base.shadow_mut().set(header::TEXT, text_id.to_string());
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Label {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

deref_base!(Label);

// ── Button ───────────────────────────────────────────────────────

pub struct Button {
    base: ComponentBase,
}

impl Button {
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(ComponentKind::Button),
        }
    }

    pub fn set_text_id(&mut self, text_id: u32) {
        self.base.shadow_mut().set(header::TEXT, text_id.to_string());
    }

    pub fn set_click_handler(&mut self, handler: HandlerRef) {
        self.base.set_handler(EventKind::Click, handler);
    }
}

impl Default for Button {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Button {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

deref_base!(Button);

// ── TextField ────────────────────────────────────────────────────

/// Editable text with per-attribute formatting tracks.
pub struct TextField {
    base: ComponentBase,
    content: String,
    tracks: BTreeMap<String, AttributeTrack>,
}

impl TextField {
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(ComponentKind::TextField),
            content: String::new(),
            tracks: BTreeMap::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn content_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Byte offset of character position `pos`.
    fn byte_index(&self, pos: usize) -> usize {
        self.content
            .char_indices()
            .nth(pos)
            .map(|(idx, _)| idx)
            .unwrap_or(self.content.len())
    }

    /// Content cut off at the first control character, if any.
    fn sanitize(content: &str) -> &str {
        match content.find(|c: char| (c as u32) < 0x20) {
            Some(idx) => &content[..idx],
            None => content,
        }
    }

    /// Replace the whole content. Control characters and anything
    /// after them are dropped, and all formatting is cleared.
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.content = Self::sanitize(&content).to_string();
        self.base
            .shadow_mut()
            .set(header::CONTENT, self.content.clone());

        if !self.tracks.is_empty() {
            self.tracks.clear();
            self.base.shadow_mut().set(header::ATTRIBUTES, "");
        }
    }

    /// Turn a boolean attribute on over a span of the content.
    pub fn set_attribute(&mut self, name: &str, start: usize, length: usize) {
        self.apply(name, start, length, AttributeValue::Flag(true));
    }

    /// Turn a boolean attribute off over a span of the content.
    pub fn clear_attribute(&mut self, name: &str, start: usize, length: usize) {
        self.apply(name, start, length, AttributeValue::Flag(false));
    }

    /// Set a multivalued attribute over a span of the content.
    pub fn set_attribute_value(
        &mut self,
        name: &str,
        start: usize,
        length: usize,
        value: impl Into<String>,
    ) {
        self.apply(name, start, length, AttributeValue::Value(value.into()));
    }

    fn apply(&mut self, name: &str, start: usize, length: usize, value: AttributeValue) {
        let content_len = self.content_len();
        if start > content_len {
            return;
        }
        let track = self
            .tracks
            .entry(name.to_string())
            .or_insert_with(|| AttributeTrack::new(AttributeClass::of(name), content_len));
        track.set(start, length, value);
        self.refresh_attributes();
    }

    pub fn attribute_track(&self, name: &str) -> Option<&AttributeTrack> {
        self.tracks.get(name)
    }

    /// Insert text at a character position, stretching the enclosing
    /// formatting runs over it.
    pub fn insert_content(&mut self, pos: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let pos = pos.min(self.content_len());
        let byte_idx = self.byte_index(pos);
        self.content.insert_str(byte_idx, text);
        let count = text.chars().count();
        for track in self.tracks.values_mut() {
            track.insert(pos, count);
        }
        self.base
            .shadow_mut()
            .set(header::CONTENT, self.content.clone());
        self.refresh_attributes();
    }

    /// Delete `count` characters at a character position, shrinking
    /// formatting runs to match.
    pub fn remove_content(&mut self, pos: usize, count: usize) {
        let content_len = self.content_len();
        if pos >= content_len || count == 0 {
            return;
        }
        let start = self.byte_index(pos);
        let end = self.byte_index((pos + count).min(content_len));
        self.content.replace_range(start..end, "");
        for track in self.tracks.values_mut() {
            track.remove(pos, count);
        }
        self.base
            .shadow_mut()
            .set(header::CONTENT, self.content.clone());
        self.refresh_attributes();
    }

    /// The full `attributes` header value, one line per attribute.
    pub fn attributes_header(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (name, track) in &self.tracks {
            if let Some(line) = track.encode(name) {
                lines.push(line);
            }
        }
        lines.join("\r\n")
    }

    fn refresh_attributes(&mut self) {
        let value = self.attributes_header();
        self.base.shadow_mut().set(header::ATTRIBUTES, value);
    }

    pub fn set_changed_handler(&mut self, handler: HandlerRef) {
        self.base.set_handler(EventKind::Changed, handler);
    }
}

impl Default for TextField {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for TextField {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn on_event(&mut self, kind: EventKind, message: &Message) -> Option<HandlerRef> {
        if kind == EventKind::Changed {
            // The client's text is now authoritative. Learn it into
            // both snapshots so no modify echoes it back, sanitized
            // the same way server-set content is.
            if let Some(content) = message.header(header::CONTENT) {
                let content = Self::sanitize(content).to_string();
                self.base
                    .shadow_mut()
                    .set_sent_eq(header::CONTENT, content.clone());
                self.content = content;
            }
            let content_len = self.content_len();
            self.tracks.clear();
            if let Some(attributes) = message.header(header::ATTRIBUTES) {
                for line in attributes.split("\r\n") {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Ok((name, track)) = AttributeTrack::decode(line, content_len) {
                        self.tracks.insert(name, track);
                    }
                }
            }
            let value = self.attributes_header();
            self.base
                .shadow_mut()
                .set_sent_eq(header::ATTRIBUTES, value);
        }
        self.base.handler(kind)
    }
}

deref_base!(TextField);

// ── Containers ───────────────────────────────────────────────────

pub struct Panel {
    base: ComponentBase,
    children: Vec<SharedComponent>,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(ComponentKind::Panel),
            children: Vec::new(),
        }
    }

    /// Place a child at a grid position. The child reaches the
    /// client when this panel is added or next updated.
    pub fn add<C: Component + 'static>(
        &mut self,
        child: &Arc<Mutex<C>>,
        horizontal: u32,
        vertical: u32,
    ) {
        if let Ok(mut locked) = child.lock() {
            locked.base_mut().set_position(horizontal, vertical);
        }
        self.children.push(child.clone() as SharedComponent);
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Panel {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
    fn children(&self) -> Vec<SharedComponent> {
        self.children.clone()
    }
}

deref_base!(Panel);

pub struct Window {
    base: ComponentBase,
    children: Vec<SharedComponent>,
}

impl Window {
    pub fn new() -> Self {
        let mut base = ComponentBase::new(ComponentKind::Window);
        base.shadow_mut().set(header::VISIBLE, "false");
        Self {
            base,
            children: Vec::new(),
        }
    }

    pub fn set_text_id(&mut self, text_id: u32) {
        self.base.shadow_mut().set(header::TEXT, text_id.to_string());
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.base
            .shadow_mut()
            .set(header::VISIBLE, if visible { "true" } else { "false" });
    }

    /// Place a child at a grid position, same as [`Panel::add`].
    pub fn add<C: Component + 'static>(
        &mut self,
        child: &Arc<Mutex<C>>,
        horizontal: u32,
        vertical: u32,
    ) {
        if let Ok(mut locked) = child.lock() {
            locked.base_mut().set_position(horizontal, vertical);
        }
        self.children.push(child.clone() as SharedComponent);
    }

    pub fn set_close_handler(&mut self, handler: HandlerRef) {
        self.base.set_handler(EventKind::Close, handler);
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Window {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
    fn children(&self) -> Vec<SharedComponent> {
        self.children.clone()
    }
}

deref_base!(Window);
