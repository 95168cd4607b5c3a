//! Derivation of per-field UI metadata from (view, state).

use crate::core::field::Field;
use crate::core::state::State;
use crate::core::view::{Condition, UiElement, ViewConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Render-ready visibility metadata for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUi {
    pub visible: bool,
    pub disabled: bool,
}

/// Compute UI metadata for every field.
///
/// Fields without a rule in the view are visible and enabled. A field
/// is disabled whenever it is not visible, or when its rule is a
/// non-toggleable fixed-value switch. Pure and total: never errors.
pub fn compute_ui(view: &ViewConfig, state: &State) -> BTreeMap<Field, FieldUi> {
    Field::ALL
        .iter()
        .map(|field| {
            let ui = match view.ui_rule(*field) {
                None => FieldUi {
                    visible: true,
                    disabled: false,
                },
                Some(UiElement::Hidden) => FieldUi {
                    visible: false,
                    disabled: true,
                },
                Some(UiElement::Visible { toggleable, .. }) => FieldUi {
                    visible: true,
                    disabled: !toggleable,
                },
                Some(UiElement::When(condition)) => {
                    let visible = eval_condition(condition, state);
                    FieldUi {
                        visible,
                        disabled: !visible,
                    }
                }
            };
            (*field, ui)
        })
        .collect()
}

/// Evaluate a condition tree with short-circuiting.
///
/// An equality leaf whose stored value has the wrong kind for the field
/// simply compares unequal; nothing here can fail.
fn eval_condition(condition: &Condition, state: &State) -> bool {
    match condition {
        Condition::Equals(field, expected) => state.get(*field) == expected,
        Condition::All(children) => children.iter().all(|child| eval_condition(child, state)),
        Condition::Any(children) => children.iter().any(|child| eval_condition(child, state)),
    }
}
