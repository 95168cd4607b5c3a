//! State resolution: the composition of codec, view registry,
//! constraint set and UI computer.
//!
//! Resolution is a pure, deterministic, idempotent function of
//! (previous state, trigger, constraint set). Snapshots are never
//! mutated in place; every resolution produces a fresh audited
//! [`ResolvedState`].

use crate::core::codec;
use crate::core::constraint::{Constraint, ConstraintSet, Outcome, Priority};
use crate::core::field::{Field, FieldValue};
use crate::core::state::{ChangeSource, State, StateChange};
use crate::core::ui::{FieldUi, compute_ui};
use crate::core::view::{ViewConfig, ViewRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// What determined a changed field's resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePriority {
    Default,
    User,
    Constraint(Priority),
}

impl fmt::Display for ChangePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangePriority::Default => f.write_str("default"),
            ChangePriority::User => f.write_str("user"),
            ChangePriority::Constraint(priority) => {
                let tag = match priority {
                    Priority::P0 => "p0",
                    Priority::P1 => "p1",
                    Priority::P2 => "p2",
                };
                write!(f, "constraint ({})", tag)
            }
        }
    }
}

impl Serialize for ChangePriority {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One audited field change within a resolution cycle.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub field: Field,
    pub url_key: &'static str,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
    pub priority: ChangePriority,
    pub reason: String,
}

/// Audit record for one resolution cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionLog {
    pub timestamp: DateTime<Utc>,
    pub trigger: String,
    /// Snapshot the cycle started from (the effective defaults for an
    /// initial resolution, the previous resolved state for a change).
    pub before: State,
    /// Snapshot the cycle produced; equals the resolved state.
    pub after: State,
    pub changes: Vec<LogEntry>,
    pub user_overrides_from_url: Vec<Field>,
}

/// The result of a resolution cycle: everything a renderer needs.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedState {
    pub state: State,
    pub ui: BTreeMap<Field, FieldUi>,
    pub view: String,
    pub user_overrides: BTreeSet<Field>,
    pub log: ResolutionLog,
}

impl ResolvedState {
    /// Canonical query encoding of this state, relative to the active
    /// view's effective defaults.
    ///
    /// A shorthand view is addressed by its shorthand key (which the
    /// default-omission pass would otherwise drop, since the shorthand
    /// field is true in the view's own defaults); a shorthand-less
    /// non-default view is addressed by an explicit `v=` pair.
    /// User-overridden fields are emitted even when their value equals
    /// the effective default: the omission law applies to non-overridden
    /// defaults only, otherwise an override protecting a field from an
    /// overridable constraint would not survive re-resolution.
    pub fn canonical_query(&self, registry: &ViewRegistry) -> String {
        let view = registry
            .by_id(&self.view)
            .unwrap_or_else(|| registry.default_view());
        let mut pairs = Vec::new();
        let mut force = self.user_overrides.clone();
        match view.shorthand {
            Some(field) => {
                pairs.push((field.url_key().to_string(), "1".to_string()));
                force.remove(&field);
            }
            None => {
                if view.id != registry.default_view().id {
                    pairs.push((super::view::VIEW_KEY.to_string(), view.id.to_string()));
                }
            }
        }
        pairs.extend(codec::encode_pairs(
            &self.state,
            &view.effective_defaults(),
            &force,
        ));
        codec::build_query(&pairs)
    }
}

/// Resolve state at session/page load from a raw URL query.
///
/// View defaults merge under URL-supplied values (URL wins; such
/// fields seed `user_overrides`), then the global and view constraints
/// run and UI metadata is derived.
pub fn resolve_initial(
    raw_query: &str,
    registry: &ViewRegistry,
    globals: &ConstraintSet,
) -> Result<ResolvedState, String> {
    let query = codec::parse_query(raw_query);
    let view = registry.active_view(&query);
    debug!(view = view.id, "resolving initial state");

    let defaults = view.effective_defaults();
    let decoded = codec::decode_all(&query);
    let mut state = defaults.clone();
    let mut overrides: BTreeSet<Field> = BTreeSet::new();
    for (field, value) in decoded {
        state.set(field, value)?;
        overrides.insert(field);
    }

    let outcome = merged_set(globals, view).apply(&state, &overrides)?;
    let changes = log_changes(&defaults, &outcome, &overrides, None);

    Ok(build_resolved(
        view,
        outcome,
        overrides,
        "initial".to_string(),
        defaults,
        changes,
        true,
    ))
}

/// Resolve a single user/system edit against a previous resolution.
///
/// The edited field becomes a user override (unless the change source
/// is `Default`), the active view is re-derived from the candidate
/// state's shorthand fields, an entered view re-applies its defaults to
/// non-overridden fields, and the identical constraint pipeline reruns.
pub fn resolve_change(
    change: &StateChange,
    prev: &ResolvedState,
    registry: &ViewRegistry,
    globals: &ConstraintSet,
) -> Result<ResolvedState, String> {
    let mut overrides = prev.user_overrides.clone();
    if change.source != ChangeSource::Default {
        overrides.insert(change.field);
    }

    let mut candidate = prev.state.with(change.field, change.value.clone())?;

    let view = registry.active_view_for_state(&candidate, &prev.view);
    if view.id != prev.view {
        debug!(from = %prev.view, to = view.id, "view switch on change");
        for (field, value) in &view.defaults {
            if !overrides.contains(field) && *field != change.field {
                candidate.set(*field, value.clone())?;
            }
        }
    }

    let outcome = merged_set(globals, view).apply(&candidate, &overrides)?;
    let changes = log_changes(&prev.state, &outcome, &overrides, Some(change));

    Ok(build_resolved(
        view,
        outcome,
        overrides,
        format!("change:{}", change.field),
        prev.state.clone(),
        changes,
        false,
    ))
}

fn merged_set(globals: &ConstraintSet, view: &ViewConfig) -> ConstraintSet {
    let constraints: Vec<Constraint> = globals
        .iter()
        .cloned()
        .chain(view.constraints.iter().cloned())
        .collect();
    ConstraintSet::new(constraints)
}

fn build_resolved(
    view: &ViewConfig,
    outcome: Outcome,
    overrides: BTreeSet<Field>,
    trigger: String,
    before: State,
    changes: Vec<LogEntry>,
    overrides_from_url: bool,
) -> ResolvedState {
    let ui = compute_ui(view, &outcome.state);
    let user_overrides_from_url = if overrides_from_url {
        overrides.iter().copied().collect()
    } else {
        Vec::new()
    };
    let after = outcome.state.clone();
    ResolvedState {
        state: outcome.state,
        ui,
        view: view.id.to_string(),
        user_overrides: overrides,
        log: ResolutionLog {
            timestamp: Utc::now(),
            trigger,
            before,
            after,
            changes,
            user_overrides_from_url,
        },
    }
}

/// Diff `before` against the post-constraint state and tag each changed
/// field with the priority that determined it.
fn log_changes(
    before: &State,
    outcome: &Outcome,
    overrides: &BTreeSet<Field>,
    change: Option<&StateChange>,
) -> Vec<LogEntry> {
    before
        .diff(&outcome.state)
        .into_iter()
        .map(|field| {
            let (priority, reason) = if let Some(winner) = outcome.winner(field) {
                (
                    ChangePriority::Constraint(winner.priority),
                    winner.reason.to_string(),
                )
            } else if let Some(change) = change.filter(|c| c.field == field) {
                match change.source {
                    ChangeSource::Default => {
                        (ChangePriority::Default, "reset to default".to_string())
                    }
                    ChangeSource::User => (ChangePriority::User, "user edit".to_string()),
                    ChangeSource::Url => (ChangePriority::User, "set from url".to_string()),
                }
            } else if overrides.contains(&field) {
                (ChangePriority::User, "set from url".to_string())
            } else {
                (ChangePriority::Default, "view default".to_string())
            };
            LogEntry {
                field,
                url_key: field.url_key(),
                old_value: before.get(field).clone(),
                new_value: outcome.state.get(field).clone(),
                priority,
                reason,
            }
        })
        .collect()
}
