//! Builders shared by unit and integration tests.

use crate::core::classifier::RefreshKind;
use crate::core::constraint::{Constraint, Predicate, Priority};
use crate::core::field::{Field, FieldValue};
use crate::core::state::State;
use crate::queue::Refresher;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A state with a batch of patches applied over the base defaults.
pub fn state_with(patches: &[(Field, FieldValue)]) -> State {
    let mut state = State::base();
    for (field, value) in patches {
        state.set(*field, value.clone()).expect("test patch");
    }
    state
}

/// A constraint with a fixed name/reason, for rule-engine tests.
pub fn constraint(
    name: &'static str,
    when: Predicate,
    patch: Vec<(Field, FieldValue)>,
    priority: Priority,
    allow_user_override: bool,
) -> Constraint {
    Constraint {
        name,
        when,
        patch,
        reason: "test rule",
        allow_user_override,
        priority,
    }
}

/// Refresher recording every `(key, kind)` it is asked to run.
#[derive(Clone, Default)]
pub struct RecordingRefresher {
    pub runs: Arc<Mutex<Vec<(String, RefreshKind)>>>,
}

impl Refresher for RecordingRefresher {
    async fn refresh(&self, key: &str, kind: RefreshKind) -> Result<()> {
        self.runs.lock().await.push((key.to_string(), kind));
        Ok(())
    }
}
