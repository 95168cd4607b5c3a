//! One interactive exploration session.
//!
//! The session owns the resolved state, the canonical URL encoding, the
//! accumulated user overrides (via [`ResolvedState`]), the refresh
//! queue, and the internal-URL-update flag that distinguishes the
//! session's own URL rewrite from genuine back/forward navigation.

use crate::catalog;
use crate::core::classifier::classify_field;
use crate::core::constraint::ConstraintSet;
use crate::core::field::{Field, FieldValue};
use crate::core::resolver::{ResolvedState, resolve_change, resolve_initial};
use crate::core::state::{ChangeSource, StateChange};
use crate::core::view::ViewRegistry;
use crate::queue::{Refresher, UpdateQueue};
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::{debug, info};

/// Refresh key used for the first load of a session. Unknown to the
/// classifier, so it maps to a full refetch.
pub const INITIAL_REFRESH_KEY: &str = "initial";

/// Result of applying a change: the new canonical query plus the
/// refresh key the caller should enqueue (absent when nothing changed).
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub query: String,
    pub refresh: Option<String>,
}

/// What a navigation event did.
#[derive(Debug, Clone)]
pub enum Navigation {
    /// Self-caused echo of the session's own URL rewrite; no
    /// resolution ran.
    Ignored,
    /// Genuine navigation; state was re-resolved from the URL.
    Applied(ChangeOutcome),
}

pub struct Session<R> {
    registry: ViewRegistry,
    globals: ConstraintSet,
    resolved: ResolvedState,
    query: String,
    /// Set after the session rewrites its own URL; the next matching
    /// navigation event is an echo, not user back/forward.
    internal_url_update: bool,
    queue: Arc<UpdateQueue<R>>,
}

impl<R: Refresher> Session<R> {
    /// Validate the catalog eagerly, resolve the initial URL, and set
    /// up the refresh queue. Configuration errors abort here, before
    /// any request is served.
    pub fn start(raw_query: &str, refresher: R) -> Result<Session<R>> {
        catalog::validate().context("catalog validation")?;
        let registry = catalog::view_registry();
        let globals = catalog::global_constraints();

        let resolved =
            resolve_initial(raw_query, &registry, &globals).map_err(|err| anyhow!(err))?;
        let query = resolved.canonical_query(&registry);
        info!(view = %resolved.view, query = %query, "session started");

        Ok(Session {
            registry,
            globals,
            resolved,
            query,
            internal_url_update: false,
            queue: Arc::new(UpdateQueue::new(refresher)),
        })
    }

    pub fn resolved(&self) -> &ResolvedState {
        &self.resolved
    }

    /// Canonical URL query for the current state.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn queue(&self) -> Arc<UpdateQueue<R>> {
        Arc::clone(&self.queue)
    }

    /// Apply one field edit through the full resolution pipeline.
    ///
    /// The session re-encodes its canonical URL (raising the internal
    /// flag so the navigation echo is not mistaken for user
    /// navigation) and returns the refresh key for the caller to
    /// enqueue.
    pub fn apply_change(
        &mut self,
        field: Field,
        value: FieldValue,
        source: ChangeSource,
    ) -> Result<ChangeOutcome> {
        let change = StateChange { field, value, source };
        let resolved = resolve_change(&change, &self.resolved, &self.registry, &self.globals)
            .map_err(|err| anyhow!(err))?;
        let refresh = refresh_key(&resolved);

        self.resolved = resolved;
        self.query = self.resolved.canonical_query(&self.registry);
        self.internal_url_update = true;
        debug!(field = %field, query = %self.query, "change applied");

        Ok(ChangeOutcome {
            query: self.query.clone(),
            refresh,
        })
    }

    /// Handle a navigation event (address-bar change).
    ///
    /// While the internal flag is set, a navigation carrying the
    /// session's own canonical query is the echo of its URL rewrite
    /// and is ignored. Anything else is genuine back/forward
    /// navigation and re-resolves from scratch.
    pub fn handle_url(&mut self, raw_query: &str) -> Result<Navigation> {
        if self.internal_url_update && raw_query.trim_start_matches('?') == self.query {
            self.internal_url_update = false;
            debug!("ignoring self-caused url update");
            return Ok(Navigation::Ignored);
        }
        self.internal_url_update = false;

        let resolved = resolve_initial(raw_query, &self.registry, &self.globals)
            .map_err(|err| anyhow!(err))?;
        let refresh = refresh_key_against(&self.resolved, &resolved);
        self.resolved = resolved;
        self.query = self.resolved.canonical_query(&self.registry);
        debug!(query = %self.query, "navigation applied");

        Ok(Navigation::Applied(ChangeOutcome {
            query: self.query.clone(),
            refresh,
        }))
    }

    /// Full state reset: discards user overrides and returns to pure
    /// view defaults.
    pub fn reset(&mut self) -> Result<ChangeOutcome> {
        let resolved =
            resolve_initial("", &self.registry, &self.globals).map_err(|err| anyhow!(err))?;
        let refresh = refresh_key_against(&self.resolved, &resolved);
        self.resolved = resolved;
        self.query = self.resolved.canonical_query(&self.registry);
        self.internal_url_update = true;
        info!("session reset to defaults");

        Ok(ChangeOutcome {
            query: self.query.clone(),
            refresh,
        })
    }
}

/// Refresh key for a resolution: the changed field with the highest
/// refresh severity, so classifying the key reproduces the batch kind.
fn refresh_key(resolved: &ResolvedState) -> Option<String> {
    let fields: Vec<Field> = resolved.log.changes.iter().map(|entry| entry.field).collect();
    most_severe(&fields)
}

/// Refresh key for a navigation/reset, derived from the diff between
/// the old and new states.
fn refresh_key_against(prev: &ResolvedState, next: &ResolvedState) -> Option<String> {
    let fields = prev.state.diff(&next.state);
    most_severe(&fields)
}

fn most_severe(fields: &[Field]) -> Option<String> {
    fields
        .iter()
        .copied()
        .max_by_key(|field| classify_field(*field))
        .map(|field| field.name().to_string())
}
