//! Process task: the long-work stage.
//!
//! Handlers do their slow work here, off the event task, so the GUI
//! stays responsive. Events whose handler also wants the update
//! stage are sent back to the event task afterwards.

use tokio::sync::mpsc;

use crate::event::{Event, EventKind, Stage, Stages};

pub(crate) async fn run_processor(
    mut rx: mpsc::UnboundedReceiver<Event>,
    event_tx: mpsc::UnboundedSender<Event>,
) {
    while let Some(mut event) = rx.recv().await {
        let stages = event.handler_stages();

        if stages.contains(Stages::PROCESS) {
            if let Some(handler) = event.handler.clone() {
                let work_event = event.clone();
                let result = tokio::task::spawn_blocking(move || {
                    if let Ok(mut handler) = handler.lock() {
                        handler.process(&work_event);
                    }
                })
                .await;
                if let Err(err) = result {
                    tracing::error!(%err, "process stage panicked");
                }
            }
        }

        if event.kind == EventKind::Disconnect {
            // Last event this connection will see.
            break;
        }

        if stages.contains(Stages::UPDATE) {
            event.stage = Stage::Update;
            if event_tx.send(event).is_err() {
                break;
            }
        }
    }
}
