//! Shared application state for the UI server.

use std::sync::Arc;
use std::time::Duration;

use resolver::core::classifier::RefreshKind;
use resolver::queue::{Refresher, UpdateQueue};
use resolver::session::Session;
use tokio::sync::{Mutex, broadcast};

use crate::config::UiConfig;

/// Events broadcast to SSE clients.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// The resolved state changed; clients should re-fetch /api/state.
    StateChanged { query: String },
    RefreshStarted { key: String, kind: RefreshKind },
    RefreshCompleted { key: String, kind: RefreshKind },
    RefreshFailed { key: String, error: String },
}

/// Refresher that announces each operation over the event channel. The
/// statistical pipeline itself lives outside this server; what the UI
/// needs is to know when a refresh is in flight. The configured delay
/// stands in for real fetch/compute time.
#[derive(Clone)]
pub struct BroadcastRefresher {
    event_tx: Arc<broadcast::Sender<ChangeEvent>>,
    delay: Duration,
}

impl Refresher for BroadcastRefresher {
    async fn refresh(&self, key: &str, kind: RefreshKind) -> anyhow::Result<()> {
        if kind == RefreshKind::Noop {
            return Ok(());
        }
        let _ = self.event_tx.send(ChangeEvent::RefreshStarted {
            key: key.to_string(),
            kind,
        });
        tokio::time::sleep(self.delay).await;
        let _ = self.event_tx.send(ChangeEvent::RefreshCompleted {
            key: key.to_string(),
            kind,
        });
        Ok(())
    }
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session<BroadcastRefresher>>>,
    pub queue: Arc<UpdateQueue<BroadcastRefresher>>,
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
    pub config: Arc<UiConfig>,
}

impl AppState {
    pub fn new(config: UiConfig, initial_query: &str) -> anyhow::Result<Self> {
        let (event_tx, _) = broadcast::channel(config.event_buffer);
        let event_tx = Arc::new(event_tx);
        let refresher = BroadcastRefresher {
            event_tx: Arc::clone(&event_tx),
            delay: Duration::from_millis(config.refresh_delay_ms),
        };

        let session = Session::start(initial_query, refresher)?;
        let queue = session.queue();

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            queue,
            event_tx,
            config: Arc::new(config),
        })
    }

    /// Run a refresh in the background and report failures over SSE.
    pub fn spawn_refresh(&self, key: String) {
        let queue = Arc::clone(&self.queue);
        let event_tx = Arc::clone(&self.event_tx);
        tokio::spawn(async move {
            if let Err(err) = queue.enqueue(&key).await {
                tracing::warn!(key = %key, error = %err, "refresh failed");
                let _ = event_tx.send(ChangeEvent::RefreshFailed {
                    key,
                    error: format!("{:#}", err),
                });
            }
        });
    }
}
