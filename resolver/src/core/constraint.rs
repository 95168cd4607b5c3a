//! Priority-ordered guarded patches over configuration state.
//!
//! Evaluation is single-pass, not a fixpoint: every predicate sees the
//! pre-patch state, so a constraint whose precondition depends on a
//! field mutated in the same cycle will not observe that mutation until
//! the next external trigger. This limitation is intentional.

use crate::core::field::{Field, FieldValue};
use crate::core::state::State;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Constraint priority. Patches apply in ascending order, so on a
/// shared field the highest matching priority wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    /// Soft default.
    P0,
    /// Business rule.
    P1,
    /// Hard constraint; never overridable by the user.
    P2,
}

/// Predicate over the pre-patch state. An `Err` is logged and treated
/// as non-matching.
pub type Predicate = fn(&State) -> Result<bool, String>;

/// A guarded, priority-tagged patch.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: &'static str,
    pub when: Predicate,
    pub patch: Vec<(Field, FieldValue)>,
    pub reason: &'static str,
    pub allow_user_override: bool,
    pub priority: Priority,
}

/// One patch entry that was applied during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    pub field: Field,
    pub value: FieldValue,
    pub constraint: &'static str,
    pub reason: &'static str,
    pub priority: Priority,
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state: State,
    /// Every patch entry applied, in application order. The last entry
    /// for a field is the one that determined its value.
    pub applied: Vec<AppliedPatch>,
}

impl Outcome {
    /// The patch that determined `field`, if any constraint touched it.
    pub fn winner(&self, field: Field) -> Option<&AppliedPatch> {
        self.applied.iter().rev().find(|patch| patch.field == field)
    }
}

/// Ordered collection of constraints (global rules first, then the
/// active view's, preserving declaration order).
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new(constraints: Vec<Constraint>) -> ConstraintSet {
        ConstraintSet { constraints }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// Apply every matching constraint to `state`.
    ///
    /// Matching is decided against the input state only (single pass).
    /// Matches apply in ascending priority; ties on the same priority
    /// apply in declaration order, so the later declaration wins on a
    /// shared field. Fields in `user_overrides` are protected from
    /// `allow_user_override=true` constraints. Two matched P2
    /// constraints writing different values to one field is a
    /// configuration error.
    pub fn apply(
        &self,
        state: &State,
        user_overrides: &BTreeSet<Field>,
    ) -> Result<Outcome, String> {
        let mut matched: Vec<(usize, &Constraint)> = Vec::new();
        for (index, constraint) in self.constraints.iter().enumerate() {
            match (constraint.when)(state) {
                Ok(true) => matched.push((index, constraint)),
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        constraint = constraint.name,
                        error = %err,
                        "constraint predicate failed, treating as non-matching"
                    );
                }
            }
        }
        matched.sort_by_key(|(index, constraint)| (constraint.priority, *index));

        self.check_hard_conflicts(&matched)?;

        let mut next = state.clone();
        let mut applied = Vec::new();
        for (_, constraint) in &matched {
            for (field, value) in &constraint.patch {
                if constraint.allow_user_override && user_overrides.contains(field) {
                    debug!(
                        constraint = constraint.name,
                        field = %field,
                        "skipping patch, field is user-overridden"
                    );
                    continue;
                }
                next.set(*field, value.clone())
                    .map_err(|err| format!("constraint {}: {}", constraint.name, err))?;
                applied.push(AppliedPatch {
                    field: *field,
                    value: value.clone(),
                    constraint: constraint.name,
                    reason: constraint.reason,
                    priority: constraint.priority,
                });
            }
        }

        Ok(Outcome { state: next, applied })
    }

    fn check_hard_conflicts(&self, matched: &[(usize, &Constraint)]) -> Result<(), String> {
        let mut hard: BTreeMap<Field, (&'static str, &FieldValue)> = BTreeMap::new();
        for (_, constraint) in matched {
            if constraint.priority != Priority::P2 {
                continue;
            }
            for (field, value) in &constraint.patch {
                match hard.get(field) {
                    Some((other, existing)) if *existing != value => {
                        return Err(format!(
                            "contradictory hard constraints on {}: '{}' vs '{}'",
                            field, other, constraint.name
                        ));
                    }
                    Some(_) => {}
                    None => {
                        hard.insert(*field, (constraint.name, value));
                    }
                }
            }
        }
        Ok(())
    }
}
