//! Immutable configuration snapshots.
//!
//! A `State` is a total mapping from every [`Field`] to a value of the
//! field's kind. Resolution never mutates a snapshot in place; it
//! clones, patches the clone, and returns it.

use crate::core::field::{Field, FieldValue, Kind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a change originated. Only `Default` is exempt from becoming a
/// user override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    User,
    Url,
    Default,
}

/// A single requested field edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub field: Field,
    pub value: FieldValue,
    pub source: ChangeSource,
}

/// Total field→value mapping. `BTreeMap` keeps iteration (and thus
/// encoding and diffing) deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    values: BTreeMap<Field, FieldValue>,
}

impl Default for State {
    fn default() -> Self {
        State::base()
    }
}

impl State {
    /// State holding every field's base default.
    pub fn base() -> State {
        let values = Field::ALL
            .iter()
            .map(|field| (*field, field.base_default()))
            .collect();
        State { values }
    }

    /// Current value of a field. Total: every field is always present.
    pub fn get(&self, field: Field) -> &FieldValue {
        // The map is populated for all fields at construction and `set`
        // never removes entries.
        &self.values[&field]
    }

    /// Set a field, rejecting kind mismatches.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), String> {
        if value.kind() != field.kind() {
            return Err(format!(
                "{}: expected {:?} value, got {:?}",
                field,
                field.kind(),
                value.kind()
            ));
        }
        self.values.insert(field, value);
        Ok(())
    }

    /// Copy of this state with one field replaced.
    pub fn with(&self, field: Field, value: FieldValue) -> Result<State, String> {
        let mut next = self.clone();
        next.set(field, value)?;
        Ok(next)
    }

    pub fn bool(&self, field: Field) -> Result<bool, String> {
        match self.get(field) {
            FieldValue::Bool(v) => Ok(*v),
            other => Err(kind_error(field, Kind::Bool, other)),
        }
    }

    pub fn int(&self, field: Field) -> Result<i64, String> {
        match self.get(field) {
            FieldValue::Int(v) => Ok(*v),
            other => Err(kind_error(field, Kind::Int, other)),
        }
    }

    pub fn text(&self, field: Field) -> Result<&str, String> {
        match self.get(field) {
            FieldValue::Text(v) => Ok(v),
            other => Err(kind_error(field, Kind::Text, other)),
        }
    }

    pub fn list(&self, field: Field) -> Result<&[String], String> {
        match self.get(field) {
            FieldValue::List(v) => Ok(v),
            other => Err(kind_error(field, Kind::List, other)),
        }
    }

    /// Fields whose values differ between `self` and `other`, in
    /// canonical order.
    pub fn diff(&self, other: &State) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| self.get(*field) != other.get(*field))
            .collect()
    }
}

fn kind_error(field: Field, wanted: Kind, got: &FieldValue) -> String {
    format!("{}: expected {:?} value, got {:?}", field, wanted, got.kind())
}
