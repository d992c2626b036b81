//! # hicp-core
//!
//! Server-side engine for the HICP remote-GUI protocol: a server
//! process describes and updates a user interface rendered by a
//! separate client, and receives the input events back.
//!
//! This crate contains:
//! - **Message**: `Message`, `MessageKind`, and the verb/header names
//! - **Codec**: `HicpCodec` for the CR LF framed text wire format via `tokio_util`
//! - **Component**: change-tracked GUI components and the attribute range engine
//! - **Text**: per-locale string storage keyed by numeric text id
//! - **Event**: the staged `EventHandler` interface and event model
//! - **Pipeline**: per-connection reader/writer/timer/event/process tasks
//! - **Session**: the facade applications drive a connection through
//! - **App**: the `App`/`Authenticator` traits and `AppRegistry`
//! - **Error**: `HicpError` — typed, `thiserror`-based error hierarchy

pub mod app;
pub mod codec;
pub mod component;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod state;
pub mod text;

mod pipeline;
mod util;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use app::{App, AppFactory, AppRegistry, Authenticator};
pub use codec::{Frame, HicpCodec, MAX_MESSAGE_SIZE};
pub use component::{
    AttributeClass, AttributeRange, AttributeTrack, AttributeValue, Button, Component,
    ComponentBase, ComponentKind, EventsValue, Label, Panel, Presentation, Selection,
    SelectionItem, SelectionMode, SharedComponent, Shadow, TextDirection, TextField, Window,
};
pub use error::HicpError;
pub use event::{Event, EventHandler, EventKind, HandlerRef, Stage, Stages};
pub use message::{category, header, verb, Message, MessageKind};
pub use session::{Session, SessionConfig};
pub use state::SessionPhase;
pub use text::{TextManager, TextSelector};
