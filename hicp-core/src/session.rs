//! Session facade: one connected client.
//!
//! A [`Session`] is the handle applications use to build their GUI,
//! manage per-locale text, schedule timers, and control the
//! connection. It is cheap to clone and safe to use from handler
//! callbacks; outbound messages go through the writer task.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::app::{AppRegistry, Authenticator};
use crate::codec::HicpCodec;
use crate::component::{Component, ComponentTable, SharedComponent, TextDirection};
use crate::error::HicpError;
use crate::event::{Event, EventKind, HandlerRef, Stages};
use crate::message::{category, header, verb, Message, MessageKind};
use crate::pipeline::{
    run_processor, run_reader, run_timer, run_writer, EventWorker, TimeCommand, TimeEntry,
    WriteCommand,
};
use crate::text::{TextManager, TextSelector};
use crate::util::lowest_free_id;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

// ── SessionConfig ────────────────────────────────────────────────

/// Everything a connection needs before it starts.
pub struct SessionConfig {
    pub registry: Arc<AppRegistry>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    /// Locale group text starts in.
    pub text_group: String,
    pub text_subgroup: String,
}

impl SessionConfig {
    pub fn new(registry: Arc<AppRegistry>) -> Self {
        Self {
            registry,
            authenticator: None,
            text_group: String::new(),
            text_subgroup: String::new(),
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_text_group(
        mut self,
        group: impl Into<String>,
        subgroup: impl Into<String>,
    ) -> Self {
        self.text_group = group.into();
        self.text_subgroup = subgroup.into();
        self
    }
}

// ── Session ──────────────────────────────────────────────────────

struct SessionInner {
    serial: u64,
    write_tx: mpsc::UnboundedSender<WriteCommand>,
    event_tx: mpsc::UnboundedSender<Event>,
    time_tx: mpsc::UnboundedSender<TimeCommand>,
    components: Mutex<ComponentTable>,
    text: Mutex<TextManager>,
    timers: Arc<Mutex<BTreeMap<u32, TimeEntry>>>,
    /// Set while an app switch is queued; inbound events are stale
    /// until the new app takes over.
    suspended: AtomicBool,
    disconnect_handler: Mutex<Option<HandlerRef>>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Run one connection to completion over any async stream.
    pub async fn serve<S>(stream: S, config: SessionConfig) -> Result<(), HicpError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let framed_read = FramedRead::new(read_half, HicpCodec::new());
        let framed_write = FramedWrite::new(write_half, HicpCodec::new());

        // Unbounded on purpose: a slow client stalls only its own
        // writer task while commands queue in order behind it.
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (process_tx, process_rx) = mpsc::unbounded_channel();
        let (time_tx, time_rx) = mpsc::unbounded_channel();

        let timers: Arc<Mutex<BTreeMap<u32, TimeEntry>>> =
            Arc::new(Mutex::new(BTreeMap::new()));

        let session = Session {
            inner: Arc::new(SessionInner {
                serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
                write_tx: write_tx.clone(),
                event_tx: event_tx.clone(),
                time_tx: time_tx.clone(),
                components: Mutex::new(ComponentTable::default()),
                text: Mutex::new(TextManager::new(config.text_group, config.text_subgroup)),
                timers: timers.clone(),
                suspended: AtomicBool::new(false),
                disconnect_handler: Mutex::new(None),
            }),
        };

        let writer = tokio::spawn(run_writer(framed_write, write_rx));
        let timer = tokio::spawn(run_timer(timers, time_rx, event_tx.clone()));
        let processor = tokio::spawn(run_processor(process_rx, event_tx.clone()));
        let events = tokio::spawn(
            EventWorker::new(
                session.clone(),
                config.registry,
                config.authenticator,
                event_rx,
                process_tx,
            )
            .run(),
        );
        let reader = tokio::spawn(run_reader(framed_read, session.clone(), time_tx));

        let join = |name: &'static str| {
            move |err: tokio::task::JoinError| HicpError::Worker(format!("{name}: {err}"))
        };
        reader.await.map_err(join("reader"))?;
        timer.await.map_err(join("timer"))?;
        events.await.map_err(join("events"))?;
        processor.await.map_err(join("processor"))?;

        let _ = write_tx.send(WriteCommand::Shutdown);
        writer.await.map_err(join("writer"))?;
        Ok(())
    }

    /// Queue an outbound message.
    pub fn write(&self, msg: Message) {
        if self.inner.write_tx.send(WriteCommand::Message(msg)).is_err() {
            tracing::debug!("writer gone, outbound message dropped");
        }
    }

    // ── Components ───────────────────────────────────────────────

    /// Send a component (and any children it holds) to the client.
    /// Adding an already added component updates it instead.
    pub fn add<C: Component + 'static>(&self, component: &Arc<Mutex<C>>) {
        let shared: SharedComponent = component.clone();
        self.add_shared(shared);
    }

    /// Send changed headers for a component. Nothing changed means
    /// nothing sent. An unadded component is added.
    pub fn update<C: Component + 'static>(&self, component: &Arc<Mutex<C>>) {
        let shared: SharedComponent = component.clone();
        self.update_shared(shared);
    }

    /// Tell the client to drop a component.
    pub fn remove<C: Component + 'static>(&self, component: &Arc<Mutex<C>>) {
        let shared: SharedComponent = component.clone();
        self.remove_shared(&shared);
    }

    fn add_shared(&self, shared: SharedComponent) {
        {
            let Ok(locked) = shared.lock() else {
                tracing::warn!("component lock poisoned, add skipped");
                return;
            };
            match locked.base().session() {
                Some(serial) if serial == self.inner.serial => {
                    drop(locked);
                    self.update_shared(shared);
                    return;
                }
                Some(_) => {
                    tracing::warn!("component belongs to another session, add skipped");
                    return;
                }
                None => {}
            }
        }

        let id = {
            let Ok(mut table) = self.inner.components.lock() else {
                return;
            };
            table.insert(shared.clone())
        };

        let (msg, children) = {
            let Ok(mut locked) = shared.lock() else {
                return;
            };
            locked.base_mut().attach(id, self.inner.serial);
            let mut msg = Message::command(verb::ADD)
                .with_header(header::CATEGORY, category::GUI)
                .with_header(header::ID, id.to_string())
                .with_header(header::COMPONENT, locked.base().kind().as_str());
            for (key, value) in locked.base().shadow().all() {
                msg.set_header(key, value);
            }
            locked.base_mut().shadow_mut().mark_sent();
            (msg, locked.children())
        };
        self.write(msg);

        // Children reach the client after their parent exists.
        for child in children {
            self.adopt_and_add(&child, id);
        }
    }

    fn adopt_and_add(&self, child: &SharedComponent, parent_id: u32) {
        let needs_add = {
            let Ok(mut locked) = child.lock() else {
                return;
            };
            if locked.base().session().is_none() {
                locked.base_mut().set_parent_id(parent_id);
                true
            } else {
                false
            }
        };
        if needs_add {
            self.add_shared(child.clone());
        }
    }

    fn update_shared(&self, shared: SharedComponent) {
        let (id, msg, children) = {
            let Ok(mut locked) = shared.lock() else {
                return;
            };
            let Some(id) = locked.base().id() else {
                drop(locked);
                self.add_shared(shared);
                return;
            };
            let changed = locked.base().shadow().changed();
            let msg = if changed.is_empty() {
                None
            } else {
                let mut msg = Message::command(verb::MODIFY)
                    .with_header(header::CATEGORY, category::GUI)
                    .with_header(header::ID, id.to_string());
                for (key, value) in changed {
                    msg.set_header(key, value);
                }
                locked.base_mut().shadow_mut().mark_sent();
                Some(msg)
            };
            (id, msg, locked.children())
        };
        if let Some(msg) = msg {
            self.write(msg);
        }
        // Children added to the container since the last update.
        for child in children {
            self.adopt_and_add(&child, id);
        }
    }

    fn remove_shared(&self, shared: &SharedComponent) {
        let id = {
            let Ok(locked) = shared.lock() else {
                return;
            };
            match (locked.base().session(), locked.base().id()) {
                (Some(serial), Some(id)) if serial == self.inner.serial => id,
                _ => {
                    tracing::warn!("component not added here, remove skipped");
                    return;
                }
            }
        };
        self.write(
            Message::command(verb::REMOVE)
                .with_header(header::CATEGORY, category::GUI)
                .with_header(header::ID, id.to_string()),
        );
        if let Ok(mut table) = self.inner.components.lock() {
            table.remove(id);
        }
        if let Ok(mut locked) = shared.lock() {
            locked.base_mut().detach();
        }
    }

    /// Remove every component, children before parents.
    pub fn remove_all_components(&self) {
        let drained = match self.inner.components.lock() {
            Ok(mut table) => table.drain(),
            Err(_) => return,
        };
        for (id, shared) in drained {
            self.write(
                Message::command(verb::REMOVE)
                    .with_header(header::CATEGORY, category::GUI)
                    .with_header(header::ID, id.to_string()),
            );
            if let Ok(mut locked) = shared.lock() {
                locked.base_mut().detach();
            }
        }
    }

    // ── Text ─────────────────────────────────────────────────────

    /// Store text for an id under a locale group, sending it to the
    /// client when the group is the current one.
    pub fn add_text(
        &self,
        text_id: u32,
        text: &str,
        group: Option<&str>,
        subgroup: Option<&str>,
    ) {
        let send = {
            let Ok(mut manager) = self.inner.text.lock() else {
                return;
            };
            manager.add_text(text_id, text, group, subgroup);
            manager.is_group(group, subgroup)
        };
        if send {
            self.send_text(text_id, text);
        }
    }

    /// Id for a string in the current group, adding and sending it
    /// if it is new.
    pub fn add_text_get_id(&self, text: &str) -> u32 {
        let text_id = {
            let Ok(mut manager) = self.inner.text.lock() else {
                return 0;
            };
            manager.add_text_get_id(text, None, None)
        };
        self.send_text(text_id, text);
        text_id
    }

    /// Add a multi-locale selector, sending its current-group text.
    pub fn add_text_selector_get_id(&self, selector: TextSelector) -> u32 {
        let (text_id, text) = {
            let Ok(mut manager) = self.inner.text.lock() else {
                return 0;
            };
            let text_id = manager.add_selector_get_id(selector);
            (text_id, manager.get_text(text_id).map(str::to_string))
        };
        if let Some(text) = text {
            self.send_text(text_id, &text);
        }
        text_id
    }

    pub fn get_text(&self, text_id: u32) -> Option<String> {
        self.inner
            .text
            .lock()
            .ok()?
            .get_text(text_id)
            .map(str::to_string)
    }

    /// Switch locale group and resend every id that resolves in it.
    pub fn set_text_group(&self, group: Option<&str>, subgroup: Option<&str>) {
        let resend: Vec<(u32, String)> = {
            let Ok(mut manager) = self.inner.text.lock() else {
                return;
            };
            manager.set_group(group, subgroup);
            manager
                .ids()
                .collect::<Vec<u32>>()
                .into_iter()
                .filter_map(|id| manager.get_text(id).map(|text| (id, text.to_string())))
                .collect()
        };
        for (text_id, text) in resend {
            self.send_text(text_id, &text);
        }
    }

    /// Order (text id, payload) pairs by their display strings in
    /// the current group, e.g. for building sorted button columns.
    pub fn sorted_by_text<T>(&self, unsorted: Vec<(u32, T)>) -> Vec<(u32, T)> {
        match self.inner.text.lock() {
            Ok(manager) => manager.sort_by_text(unsorted),
            Err(_) => Vec::new(),
        }
    }

    pub fn text_group(&self) -> Option<(String, String)> {
        let manager = self.inner.text.lock().ok()?;
        let (group, subgroup) = manager.group();
        Some((group.to_string(), subgroup.to_string()))
    }

    fn send_text(&self, text_id: u32, text: &str) {
        self.write(
            Message::command(verb::ADD)
                .with_header(header::CATEGORY, category::TEXT)
                .with_header(header::ID, text_id.to_string())
                .with_header(header::TEXT, text),
        );
    }

    // ── Connection control ───────────────────────────────────────

    /// Set the client's reading direction.
    pub fn set_text_direction(&self, first: TextDirection, second: TextDirection) {
        self.write(
            Message::command(verb::MODIFY)
                .with_header(header::CATEGORY, category::GUI)
                .with_header(
                    header::TEXT_DIRECTION,
                    format!("{},{}", first.as_str(), second.as_str()),
                ),
        );
    }

    /// Ask the client to disconnect.
    pub fn disconnect(&self) {
        self.write(Message::command(verb::DISCONNECT));
    }

    /// Tear down the current app and start another. Events already
    /// queued for the old app are dropped.
    pub fn switch_app(&self, app: Option<&str>) {
        self.inner.suspended.store(true, Ordering::SeqCst);
        let event = Event::switch_app(app.map(str::to_string));
        if self.inner.event_tx.send(event).is_err() {
            tracing::warn!("event task gone, switch request dropped");
        }
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_suspended(&self) {
        self.inner.suspended.store(false, Ordering::SeqCst);
    }

    /// Handler run when the connection closes. Only its process
    /// stage is used.
    pub fn set_disconnect_handler(&self, handler: HandlerRef) {
        let has_process = handler
            .lock()
            .map(|handler| handler.stages().contains(Stages::PROCESS))
            .unwrap_or(false);
        if !has_process {
            tracing::warn!("disconnect handler has no process stage, will never run");
        }
        if let Ok(mut slot) = self.inner.disconnect_handler.lock() {
            *slot = Some(handler);
        }
    }

    /// Inject an event as if the client had sent it.
    pub fn fake_event(&self, msg: Message) {
        let Some(event) = self.resolve_event(msg) else {
            return;
        };
        if self.inner.event_tx.send(event).is_err() {
            tracing::warn!("event task gone, fake event dropped");
        }
    }

    // ── Timers ───────────────────────────────────────────────────

    /// Schedule a handler after `delay`, repeating at `repeat` if
    /// given. Returns an id for [`remove_time_handler`](Self::remove_time_handler).
    pub fn add_time_handler(
        &self,
        handler: HandlerRef,
        delay: Duration,
        repeat: Option<Duration>,
    ) -> u32 {
        let id = {
            let Ok(mut timers) = self.inner.timers.lock() else {
                return 0;
            };
            let id = lowest_free_id(&timers);
            timers.insert(
                id,
                TimeEntry {
                    handler,
                    deadline: Instant::now() + delay,
                    repeat,
                },
            );
            id
        };
        let _ = self.inner.time_tx.send(TimeCommand::Wake);
        id
    }

    pub fn remove_time_handler(&self, id: u32) {
        if let Ok(mut timers) = self.inner.timers.lock() {
            timers.remove(&id);
        }
        let _ = self.inner.time_tx.send(TimeCommand::Wake);
    }

    // ── Inbound dispatch ─────────────────────────────────────────

    /// Route one inbound message into the pipeline. Returns true
    /// when it was a disconnect.
    pub(crate) fn dispatch_inbound(&self, msg: Message) -> bool {
        if msg.kind() != MessageKind::Event {
            tracing::warn!(verb = msg.verb(), "non-event from client, skipped");
            return false;
        }
        if EventKind::from_verb(msg.verb()) == Some(EventKind::Disconnect) {
            self.dispatch_disconnect();
            return true;
        }
        let Some(event) = self.resolve_event(msg) else {
            return false;
        };
        if self.inner.event_tx.send(event).is_err() {
            tracing::warn!("event task gone, inbound event dropped");
        }
        false
    }

    /// Build an event from a message, resolving the target component
    /// and its handler.
    fn resolve_event(&self, msg: Message) -> Option<Event> {
        let kind = match EventKind::from_verb(msg.verb()) {
            Some(kind) => kind,
            None => {
                tracing::warn!(verb = msg.verb(), "unknown event verb, skipped");
                return None;
            }
        };
        let mut event = Event::inbound(kind, msg);

        if kind == EventKind::Disconnect {
            event.handler = self.disconnect_process_handler();
            return Some(event);
        }

        if kind.is_component_event() {
            let msg = event.message.as_ref()?;
            let Some(id) = msg.id() else {
                tracing::warn!(kind = ?kind, "component event without id, dropped");
                return None;
            };
            let component = {
                let table = self.inner.components.lock().ok()?;
                table.get(id)
            };
            let Some(component) = component else {
                tracing::warn!(id, "event for unknown component, dropped");
                return None;
            };
            let handler = {
                let mut locked = component.lock().ok()?;
                let msg = event.message.as_ref()?;
                locked.on_event(kind, msg)
            };
            event.component = Some(component);
            event.handler = handler;
        }
        Some(event)
    }

    /// The connection is gone; run the disconnect handler's process
    /// stage and let the workers wind down.
    pub(crate) fn dispatch_disconnect(&self) {
        let mut event = Event::inbound(EventKind::Disconnect, Message::event(verb::DISCONNECT));
        event.handler = self.disconnect_process_handler();
        if self.inner.event_tx.send(event).is_err() {
            tracing::debug!("event task already stopped");
        }
    }

    fn disconnect_process_handler(&self) -> Option<HandlerRef> {
        let handler = self.inner.disconnect_handler.lock().ok()?.clone()?;
        let has_process = handler
            .lock()
            .map(|handler| handler.stages().contains(Stages::PROCESS))
            .unwrap_or(false);
        has_process.then_some(handler)
    }
}
