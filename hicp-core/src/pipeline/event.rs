//! Event task: connection state machine and stage dispatch.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::app::{App, AppRegistry, Authenticator};
use crate::event::{Event, EventKind, Stage, Stages};
use crate::message::{header, verb, Message};
use crate::session::Session;
use crate::state::SessionPhase;

pub(crate) struct EventWorker {
    session: Session,
    registry: Arc<AppRegistry>,
    authenticator: Option<Arc<dyn Authenticator>>,
    rx: mpsc::UnboundedReceiver<Event>,
    process_tx: mpsc::UnboundedSender<Event>,
    phase: SessionPhase,
    /// The running application, once started.
    app: Option<Box<dyn App>>,
    /// App requested at connect, held until authentication passes.
    requested_app: Option<String>,
    /// App instance doing its own authentication, not yet started.
    pending_app: Option<Box<dyn App>>,
}

impl EventWorker {
    pub(crate) fn new(
        session: Session,
        registry: Arc<AppRegistry>,
        authenticator: Option<Arc<dyn Authenticator>>,
        rx: mpsc::UnboundedReceiver<Event>,
        process_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            session,
            registry,
            authenticator,
            rx,
            process_tx,
            phase: SessionPhase::WaitConnect,
            app: None,
            requested_app: None,
            pending_app: None,
        }
    }

    pub(crate) async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if self.handle(event).await {
                break;
            }
        }
        if let Some(mut app) = self.app.take() {
            app.stopped(&self.session).await;
        }
    }

    /// Handle one event; true means the connection is over.
    async fn handle(&mut self, event: Event) -> bool {
        if event.kind == EventKind::Disconnect {
            // Hand it to the process task whatever the phase, so a
            // disconnect handler still runs, then stop.
            let _ = self.process_tx.send(event);
            return true;
        }

        match self.phase {
            SessionPhase::WaitConnect => self.handle_wait_connect(event).await,
            SessionPhase::WaitAuthenticate => self.handle_wait_authenticate(event).await,
            SessionPhase::Running => self.handle_running(event).await,
        }
        false
    }

    async fn handle_wait_connect(&mut self, event: Event) {
        if event.kind != EventKind::Connect {
            tracing::debug!(kind = ?event.kind, "event before connect, dropped");
            return;
        }
        let requested = event
            .message
            .as_ref()
            .and_then(|msg| msg.header(header::APPLICATION))
            .map(str::to_string);

        if let Some(authenticator) = self.authenticator.clone() {
            self.requested_app = requested;
            self.send_authenticate_request(authenticator.methods());
            self.move_to(SessionPhase::WaitAuthenticate);
            return;
        }

        let Some(app) = self.create_app(requested.as_deref()) else {
            tracing::warn!("no application available, disconnecting");
            self.session.disconnect();
            return;
        };
        if app.handles_authentication() {
            self.pending_app = Some(app);
            self.send_authenticate_request(vec![crate::message::METHOD_PLAIN.to_string()]);
            self.move_to(SessionPhase::WaitAuthenticate);
        } else {
            self.start_app(app).await;
        }
    }

    async fn handle_wait_authenticate(&mut self, event: Event) {
        if event.kind != EventKind::Authenticate {
            tracing::debug!(kind = ?event.kind, "event while unauthenticated, dropped");
            return;
        }
        let Some(msg) = &event.message else {
            return;
        };

        if let Some(authenticator) = self.authenticator.clone() {
            if authenticator.authenticate(msg).await {
                let requested = self.requested_app.take();
                match self.create_app(requested.as_deref()) {
                    Some(app) => self.start_app(app).await,
                    None => {
                        tracing::warn!("no application available, disconnecting");
                        self.session.disconnect();
                    }
                }
            } else {
                // Client may retry with different credentials.
                tracing::warn!("authentication failed");
            }
            return;
        }

        if let Some(mut app) = self.pending_app.take() {
            if app.authenticate(&self.session, msg).await {
                self.start_app(app).await;
            } else {
                tracing::warn!("application rejected credentials");
                self.pending_app = Some(app);
            }
        }
    }

    async fn handle_running(&mut self, event: Event) {
        if event.kind == EventKind::SwitchApp {
            self.switch_app(event.app).await;
            return;
        }
        if self.session.is_suspended() {
            // Stale events queued before the switch request.
            tracing::debug!(kind = ?event.kind, "suspended, event dropped");
            return;
        }
        if event.kind == EventKind::Authenticate {
            tracing::debug!("authenticate event while running, dropped");
            return;
        }
        self.dispatch_stages(event).await;
    }

    /// Run the stages the event's handler declares. Feedback runs
    /// here, process is shipped to the process task, update runs
    /// here once the event comes back (or right away when there is
    /// no process stage).
    async fn dispatch_stages(&mut self, mut event: Event) {
        match event.stage {
            Stage::Feedback => {
                let stages = event.handler_stages();
                if stages.contains(Stages::FEEDBACK) {
                    if let Some(handler) = event.handler.clone() {
                        if let Ok(mut handler) = handler.lock() {
                            handler.feedback(&self.session, &event);
                        }
                    }
                }
                if stages.contains(Stages::PROCESS) {
                    event.stage = Stage::Process;
                    let _ = self.process_tx.send(event);
                } else if stages.contains(Stages::UPDATE) {
                    event.stage = Stage::Update;
                    self.run_update(&event);
                }
            }
            Stage::Update => self.run_update(&event),
            // Process-stage events only ever go to the process task.
            Stage::Process => {}
        }
    }

    fn run_update(&self, event: &Event) {
        if let Some(handler) = event.handler.clone() {
            if let Ok(mut handler) = handler.lock() {
                handler.update(&self.session, event);
            }
        }
    }

    async fn switch_app(&mut self, requested: Option<String>) {
        self.session.remove_all_components();
        if let Some(mut app) = self.app.take() {
            app.stopped(&self.session).await;
        }
        self.session.clear_suspended();
        match self.create_app(requested.as_deref()) {
            Some(mut app) => {
                app.connected(&self.session).await;
                self.app = Some(app);
            }
            None => {
                tracing::warn!(app = ?requested, "switch target unknown, disconnecting");
                self.session.disconnect();
            }
        }
    }

    fn create_app(&self, requested: Option<&str>) -> Option<Box<dyn App>> {
        let name = self.registry.resolve(requested)?;
        self.registry.create(name)
    }

    async fn start_app(&mut self, mut app: Box<dyn App>) {
        self.move_to(SessionPhase::Running);
        app.connected(&self.session).await;
        self.app = Some(app);
    }

    fn send_authenticate_request(&self, methods: Vec<String>) {
        let msg = Message::command(verb::AUTHENTICATE)
            .with_header(header::METHOD, methods.join(", "));
        self.session.write(msg);
    }

    fn move_to(&mut self, next: SessionPhase) {
        match self.phase.transition(next) {
            Ok(phase) => self.phase = phase,
            Err(err) => tracing::error!(%err, from = ?self.phase, to = ?next, "bad transition"),
        }
    }
}
