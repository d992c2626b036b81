//! Protocol message model: type line, verb, and header map.
//!
//! Every HICP message is a type line (`event: …` or `command: …`)
//! followed by headers and a blank line. Header keys are
//! case-insensitive and stored lower-case; insertion order is
//! preserved so encoded output is deterministic.

use std::fmt;
use std::str::FromStr;

use crate::error::HicpError;

// ── Verbs ────────────────────────────────────────────────────────

/// Message verbs (the value of the type line).
pub mod verb {
    // Commands (server → client).
    pub const ADD: &str = "add";
    pub const MODIFY: &str = "modify";
    pub const REMOVE: &str = "remove";

    // Events (client → server).
    pub const CHANGED: &str = "changed";
    pub const CLICK: &str = "click";
    pub const CLOSE: &str = "close";

    // Both directions.
    pub const AUTHENTICATE: &str = "authenticate";
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
}

// ── Headers ──────────────────────────────────────────────────────

/// Header keys (always lower-case on the wire).
pub mod header {
    pub const APPLICATION: &str = "application";
    pub const ATTRIBUTES: &str = "attributes";
    pub const CATEGORY: &str = "category";
    pub const COMPONENT: &str = "component";
    pub const CONTENT: &str = "content";
    pub const EVENTS: &str = "events";
    pub const ID: &str = "id";
    pub const ITEMS: &str = "items";
    pub const METHOD: &str = "method";
    pub const MODE: &str = "mode";
    pub const PARENT: &str = "parent";
    pub const PASSWORD: &str = "password";
    pub const POSITION: &str = "position";
    pub const PRESENTATION: &str = "presentation";
    pub const SELECTED: &str = "selected";
    pub const SIZE: &str = "size";
    pub const TEXT: &str = "text";
    pub const TEXT_DIRECTION: &str = "text-direction";
    pub const USER: &str = "user";
    pub const VISIBLE: &str = "visible";
}

/// Values for the `category` header.
pub mod category {
    pub const GUI: &str = "gui";
    pub const TEXT: &str = "text";
}

/// The `plain` authentication method.
pub const METHOD_PLAIN: &str = "plain";

// ── MessageKind ──────────────────────────────────────────────────

/// Distinguishes events (client → server) from commands
/// (server → client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Event,
    Command,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Event => "event",
            MessageKind::Command => "command",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = HicpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(MessageKind::Event),
            "command" => Ok(MessageKind::Command),
            other => Err(HicpError::UnknownMessageType(other.to_string())),
        }
    }
}

// ── Message ──────────────────────────────────────────────────────

/// One protocol message: kind, verb, and ordered headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    verb: String,
    headers: Vec<(String, String)>,
}

impl Message {
    /// Create an event message with the given verb.
    pub fn event(verb: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Event,
            verb: verb.into(),
            headers: Vec::new(),
        }
    }

    /// Create a command message with the given verb.
    pub fn command(verb: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Command,
            verb: verb.into(),
            headers: Vec::new(),
        }
    }

    pub(crate) fn new(kind: MessageKind, verb: impl Into<String>) -> Self {
        Self {
            kind,
            verb: verb.into(),
            headers: Vec::new(),
        }
    }

    /// Builder-style header insertion.
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Insert or replace a header. Keys are stored lower-case.
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        let value = value.into();
        for entry in &mut self.headers {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.headers.push((key, value));
    }

    /// Look up a header value, case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `id` header parsed as a component or text id.
    pub fn id(&self) -> Option<u32> {
        self.header(header::ID)?.trim().parse().ok()
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Iterate headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({} headers)", self.kind, self.verb, self.headers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        assert_eq!("event".parse::<MessageKind>().unwrap(), MessageKind::Event);
        assert_eq!(
            "command".parse::<MessageKind>().unwrap(),
            MessageKind::Command
        );
        assert!("response".parse::<MessageKind>().is_err());
    }

    #[test]
    fn headers_case_insensitive() {
        let msg = Message::command(verb::ADD).with_header("Category", category::GUI);
        assert_eq!(msg.header("category"), Some(category::GUI));
        assert_eq!(msg.header("CATEGORY"), Some(category::GUI));
        assert_eq!(msg.header("missing"), None);
    }

    #[test]
    fn set_header_replaces() {
        let mut msg = Message::command(verb::MODIFY);
        msg.set_header(header::CONTENT, "one");
        msg.set_header(header::CONTENT, "two");
        assert_eq!(msg.header(header::CONTENT), Some("two"));
        assert_eq!(msg.headers().count(), 1);
    }

    #[test]
    fn id_header_parses() {
        let msg = Message::event(verb::CLICK).with_header(header::ID, "17");
        assert_eq!(msg.id(), Some(17));

        let msg = Message::event(verb::CLICK).with_header(header::ID, "seventeen");
        assert_eq!(msg.id(), None);
    }

    #[test]
    fn insertion_order_preserved() {
        let msg = Message::command(verb::ADD)
            .with_header("b", "1")
            .with_header("a", "2")
            .with_header("c", "3");
        let keys: Vec<&str> = msg.headers().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
