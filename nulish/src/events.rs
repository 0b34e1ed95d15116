//! Typed change notifications, also streamed to browsers as SSE.

use std::{convert::Infallible, time::Duration};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{openapi::aide::axum::ApiRouter, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    NotesChanged,
    TagsChanged,
}

impl ChangeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotesChanged => "notes_changed",
            Self::TagsChanged => "tags_changed",
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, event: ChangeEvent) {
        tracing::debug!(event = event.name(), receivers = self.tx.receiver_count(), "notify");
        // no receivers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new().route("/api/v1/events", get(events)).with_state(state)
}

async fn events(State(events): State<Notifier>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(events.subscribe()).filter_map(|event| match event {
        Ok(event) => serde_json::to_string(&event)
            .ok()
            .map(|data| Ok(Event::default().event(event.name()).data(data))),
        // lagged receivers just skip ahead
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive"))
}
