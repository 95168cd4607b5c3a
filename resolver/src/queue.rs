//! Serialized, coalescing execution of data-refresh operations.
//!
//! At most one refresh is ever in flight. While one runs, new requests
//! overwrite a single pending slot (capacity 1, never a list), so the
//! next run always reflects the latest request and intermediate keys
//! are dropped. There is no cancellation; safety comes from
//! serialization, not abort signals.

use crate::core::classifier::{RefreshKind, classify_key};
use anyhow::{Result, anyhow};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Executes one refresh operation. The kind is pre-classified from the
/// key; `Noop` calls are expected to return quickly without touching
/// the network.
pub trait Refresher: Send + Sync + 'static {
    fn refresh(
        &self,
        key: &str,
        kind: RefreshKind,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// What `enqueue` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// This caller drove the drain loop; `operations` refreshes ran.
    Ran { operations: u32 },
    /// A refresh was already in flight; the key went into (and may
    /// later be overwritten out of) the pending slot.
    Coalesced,
}

#[derive(Debug, Default)]
struct Slots {
    running: bool,
    pending: Option<String>,
}

/// The per-session refresh queue.
#[derive(Debug)]
pub struct UpdateQueue<R> {
    slots: Mutex<Slots>,
    refresher: R,
}

impl<R: Refresher> UpdateQueue<R> {
    pub fn new(refresher: R) -> UpdateQueue<R> {
        UpdateQueue {
            slots: Mutex::new(Slots::default()),
            refresher,
        }
    }

    /// Request a refresh for `key` (a changed-field name).
    ///
    /// If idle, this caller runs the refresh and then drains the
    /// pending slot until it stays empty. If busy, the key overwrites
    /// the pending slot and the call returns immediately.
    ///
    /// Refresh failures do not corrupt the slots: the drain continues,
    /// the running flag is always cleared, and the first error is
    /// returned to this (driving) caller once the queue is idle again.
    pub async fn enqueue(&self, key: &str) -> Result<Enqueued> {
        {
            let mut slots = self.slots.lock().await;
            if slots.running {
                debug!(key, replaced = ?slots.pending, "coalescing refresh request");
                slots.pending = Some(key.to_string());
                return Ok(Enqueued::Coalesced);
            }
            slots.running = true;
        }

        let mut current = key.to_string();
        let mut operations = 0u32;
        let mut first_error: Option<anyhow::Error> = None;

        loop {
            let kind = classify_key(&current);
            debug!(key = %current, ?kind, "running refresh");
            let result = self.refresher.refresh(&current, kind).await;
            operations += 1;
            if let Err(err) = result {
                warn!(key = %current, error = %err, "refresh failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }

            let mut slots = self.slots.lock().await;
            match slots.pending.take() {
                Some(next) => current = next,
                None => {
                    slots.running = false;
                    break;
                }
            }
        }

        match first_error {
            Some(err) => Err(anyhow!(err).context(format!("refresh for '{}' failed", key))),
            None => Ok(Enqueued::Ran { operations }),
        }
    }

    /// True while a refresh is in flight.
    pub async fn is_running(&self) -> bool {
        self.slots.lock().await.running
    }
}
