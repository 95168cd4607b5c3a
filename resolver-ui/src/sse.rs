//! Server-Sent Events stream of state and refresh activity.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use resolver::core::classifier::RefreshKind;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::{AppState, ChangeEvent};

#[derive(Serialize)]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<RefreshKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&ChangeEvent> for SsePayload {
    fn from(event: &ChangeEvent) -> Self {
        match event {
            ChangeEvent::StateChanged { query } => SsePayload {
                event_type: "state_changed".to_string(),
                query: Some(query.clone()),
                key: None,
                kind: None,
                error: None,
            },
            ChangeEvent::RefreshStarted { key, kind } => SsePayload {
                event_type: "refresh_started".to_string(),
                query: None,
                key: Some(key.clone()),
                kind: Some(*kind),
                error: None,
            },
            ChangeEvent::RefreshCompleted { key, kind } => SsePayload {
                event_type: "refresh_completed".to_string(),
                query: None,
                key: Some(key.clone()),
                kind: Some(*kind),
                error: None,
            },
            ChangeEvent::RefreshFailed { key, error } => SsePayload {
                event_type: "refresh_failed".to_string(),
                query: None,
                key: Some(key.clone()),
                kind: None,
                error: Some(error.clone()),
            },
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();
    let keep_alive_secs = state.config.keep_alive_secs;

    let stream = async_stream::stream! {
        // Send initial connected event
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(change_event) => {
                    let payload = SsePayload::from(&change_event);
                    if let Ok(json) = serde_json::to_string(&payload) {
                        yield Ok(Event::default().event("change").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(keep_alive_secs))
            .text("ping"),
    )
}
