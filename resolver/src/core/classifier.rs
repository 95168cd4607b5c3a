//! Deterministic classification of changed fields into refresh work.

use crate::core::field::Field;
use serde::{Deserialize, Serialize};

/// What a change batch requires from the data layer, ordered by
/// severity so batches can take the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshKind {
    /// Display-only change; the chart re-renders from data in hand.
    Noop,
    /// Derived series must be recomputed from already-fetched data.
    Recompute,
    /// The source dataset selection changed; fetch again.
    Refetch,
}

/// Classify a single field.
pub fn classify_field(field: Field) -> RefreshKind {
    match field {
        Field::Countries | Field::AgeGroups | Field::DateRange | Field::Metric => {
            RefreshKind::Refetch
        }
        Field::BaselineMethod
        | Field::BaselineWindow
        | Field::Zscores
        | Field::Excess
        | Field::Cumulative => RefreshKind::Recompute,
        Field::ChartStyle
        | Field::ShowBaseline
        | Field::ShowPredictionInterval
        | Field::ShowTotals
        | Field::ShowTotalsOnly
        | Field::ShowPercentage => RefreshKind::Noop,
    }
}

/// Classify a refresh key (a field name). Unknown keys classify as
/// `Refetch`: refetching is always safe, skipping is not.
pub fn classify_key(key: &str) -> RefreshKind {
    match Field::from_name(key) {
        Some(field) => classify_field(field),
        None => RefreshKind::Refetch,
    }
}

/// Maximum severity over a batch of changed fields. Empty batches are
/// `Noop`.
pub fn classify_fields(fields: &[Field]) -> RefreshKind {
    fields
        .iter()
        .map(|field| classify_field(*field))
        .max()
        .unwrap_or(RefreshKind::Noop)
}
