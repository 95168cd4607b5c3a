//! The mortality-charts configuration catalog: global business rules,
//! view modes, and the eager startup validation over both.

use crate::core::constraint::{Constraint, ConstraintSet, Priority};
use crate::core::field::{Field, FieldValue};
use crate::core::state::State;
use crate::core::view::{Condition, UiElement, VIEW_KEY, ViewConfig, ViewRegistry};
use anyhow::{Result, bail};

fn style_is_matrix(state: &State) -> Result<bool, String> {
    Ok(state.text(Field::ChartStyle)? == "matrix")
}

fn totals_hidden(state: &State) -> Result<bool, String> {
    Ok(!state.bool(Field::ShowTotals)?)
}

fn no_baseline_method(state: &State) -> Result<bool, String> {
    Ok(state.text(Field::BaselineMethod)? == "none")
}

fn baseline_hidden(state: &State) -> Result<bool, String> {
    Ok(!state.bool(Field::ShowBaseline)?)
}

fn always(_: &State) -> Result<bool, String> {
    Ok(true)
}

/// Global constraints, in declaration order (the tie-break within a
/// priority level).
pub fn global_constraints() -> ConstraintSet {
    ConstraintSet::new(vec![
        Constraint {
            name: "matrix-hides-baseline",
            when: style_is_matrix,
            patch: vec![
                (Field::ShowBaseline, FieldValue::Bool(false)),
                (Field::ShowPredictionInterval, FieldValue::Bool(false)),
            ],
            reason: "matrix cells have no baseline band",
            allow_user_override: false,
            priority: Priority::P2,
        },
        Constraint {
            name: "totals-only-needs-totals",
            when: totals_hidden,
            patch: vec![(Field::ShowTotalsOnly, FieldValue::Bool(false))],
            reason: "totals-only mode requires totals",
            allow_user_override: false,
            priority: Priority::P1,
        },
        Constraint {
            name: "no-baseline-method-hides-baseline",
            when: no_baseline_method,
            patch: vec![(Field::ShowBaseline, FieldValue::Bool(false))],
            reason: "no baseline method selected",
            allow_user_override: true,
            priority: Priority::P1,
        },
        Constraint {
            name: "hidden-baseline-hides-interval",
            when: baseline_hidden,
            patch: vec![(Field::ShowPredictionInterval, FieldValue::Bool(false))],
            reason: "prediction interval needs a visible baseline",
            allow_user_override: true,
            priority: Priority::P0,
        },
    ])
}

/// All view modes. Shorthand views come first; their declaration order
/// is the URL activation precedence (most specific first).
pub fn view_registry() -> ViewRegistry {
    ViewRegistry::new(vec![zscore_view(), excess_view(), explorer_view()], "explorer")
}

fn explorer_view() -> ViewConfig {
    ViewConfig {
        id: "explorer",
        shorthand: None,
        defaults: Vec::new(),
        ui: vec![
            // Cumulation only makes sense for excess deaths.
            (Field::Cumulative, UiElement::Hidden),
            (
                Field::ShowTotalsOnly,
                UiElement::When(Condition::Equals(Field::ShowTotals, FieldValue::Bool(true))),
            ),
            (
                Field::ShowPredictionInterval,
                UiElement::When(Condition::All(vec![
                    Condition::Equals(Field::ShowBaseline, FieldValue::Bool(true)),
                    Condition::Any(vec![
                        Condition::Equals(Field::ChartStyle, FieldValue::text("line")),
                        Condition::Equals(Field::ChartStyle, FieldValue::text("bar")),
                    ]),
                ])),
            ),
        ],
        constraints: Vec::new(),
    }
}

fn excess_view() -> ViewConfig {
    ViewConfig {
        id: "excess",
        shorthand: Some(Field::Excess),
        defaults: vec![
            (Field::Excess, FieldValue::Bool(true)),
            (Field::ChartStyle, FieldValue::text("bar")),
            (Field::ShowBaseline, FieldValue::Bool(false)),
        ],
        ui: vec![
            // The excess computation embeds the baseline; the toggle is
            // shown off and locked.
            (Field::ShowBaseline, UiElement::fixed(false)),
            (Field::ShowPredictionInterval, UiElement::Hidden),
            (
                Field::ShowTotalsOnly,
                UiElement::When(Condition::Equals(Field::ShowTotals, FieldValue::Bool(true))),
            ),
        ],
        constraints: vec![Constraint {
            name: "excess-needs-baseline-method",
            when: no_baseline_method,
            patch: vec![(Field::BaselineMethod, FieldValue::text("mean"))],
            reason: "excess deaths require a baseline fit",
            allow_user_override: false,
            priority: Priority::P2,
        }],
    }
}

fn zscore_view() -> ViewConfig {
    ViewConfig {
        id: "zscore",
        shorthand: Some(Field::Zscores),
        defaults: vec![
            (Field::Zscores, FieldValue::Bool(true)),
            (Field::ChartStyle, FieldValue::text("line")),
            (Field::ShowBaseline, FieldValue::Bool(false)),
        ],
        ui: vec![
            // Z-scores are already baseline-normalized; excess-only
            // controls stay inactive here.
            (Field::ShowBaseline, UiElement::fixed(false)),
            (Field::ShowPredictionInterval, UiElement::Hidden),
            (Field::Cumulative, UiElement::Hidden),
            (Field::ShowPercentage, UiElement::Hidden),
        ],
        constraints: vec![Constraint {
            name: "zscore-normalized-display",
            when: always,
            patch: vec![
                (Field::ShowBaseline, FieldValue::Bool(false)),
                (Field::Cumulative, FieldValue::Bool(false)),
                (Field::ShowPredictionInterval, FieldValue::Bool(false)),
            ],
            reason: "z-scores are baseline-normalized",
            allow_user_override: false,
            priority: Priority::P2,
        }],
    }
}

/// Eager startup validation of the whole catalog.
///
/// Configuration errors abort initialization; they must never surface
/// per-request.
pub fn validate() -> Result<()> {
    let mut errors = Vec::new();

    let mut keys = std::collections::HashSet::new();
    for field in Field::ALL {
        let key = field.url_key();
        if key == VIEW_KEY {
            errors.push(format!("{}: url key '{}' is reserved for view selection", field, key));
        }
        if !keys.insert(key) {
            errors.push(format!("{}: duplicate url key '{}'", field, key));
        }
        if field.base_default().kind() != field.kind() {
            errors.push(format!("{}: base default has wrong kind", field));
        }
    }

    let registry = view_registry();
    errors.extend(registry.validate());

    for constraint in global_constraints().iter() {
        errors.extend(check_patch_kinds(constraint));
    }
    for view in registry.views() {
        for constraint in &view.constraints {
            errors.extend(check_patch_kinds(constraint));
        }
    }

    if !errors.is_empty() {
        bail!("catalog validation failed:\n- {}", errors.join("\n- "));
    }
    Ok(())
}

fn check_patch_kinds(constraint: &Constraint) -> Vec<String> {
    constraint
        .patch
        .iter()
        .filter(|(field, value)| value.kind() != field.kind())
        .map(|(field, _)| {
            format!(
                "constraint {}: patch value for {} has wrong kind",
                constraint.name, field
            )
        })
        .collect()
}
