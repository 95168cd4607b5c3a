//! View modes: named bundles of defaults, UI rules and constraints.
//!
//! Determining the active view is itself a fixed-precedence rule:
//! shorthand parameters are checked in declaration order (most specific
//! first), then the generic `v=` parameter, else the default view.

use crate::core::codec::{self, Query};
use crate::core::constraint::Constraint;
use crate::core::field::{Field, FieldValue, Kind};
use crate::core::state::State;

/// Generic view-selection query key (`v=<id>`), reserved: no field may
/// use it as a URL key.
pub const VIEW_KEY: &str = "v";

/// AND/OR tree of field-equality leaves used by conditional UI rules.
#[derive(Debug, Clone)]
pub enum Condition {
    Equals(Field, FieldValue),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

/// Per-field visibility rule within a view.
#[derive(Debug, Clone)]
pub enum UiElement {
    Hidden,
    Visible {
        toggleable: bool,
        /// Rendered value for fixed, non-toggleable switches.
        fixed_value: Option<bool>,
    },
    When(Condition),
}

impl UiElement {
    pub fn visible() -> UiElement {
        UiElement::Visible {
            toggleable: true,
            fixed_value: None,
        }
    }

    pub fn fixed(value: bool) -> UiElement {
        UiElement::Visible {
            toggleable: false,
            fixed_value: Some(value),
        }
    }
}

/// A named view mode.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub id: &'static str,
    /// Boolean field whose `=1` URL token activates this view.
    pub shorthand: Option<Field>,
    /// Defaults overlaid on the base defaults when the view is entered.
    pub defaults: Vec<(Field, FieldValue)>,
    pub ui: Vec<(Field, UiElement)>,
    pub constraints: Vec<Constraint>,
}

impl ViewConfig {
    /// Base defaults overlaid with this view's defaults. Used both for
    /// entering the view and for canonical URL omission.
    pub fn effective_defaults(&self) -> State {
        let mut state = State::base();
        for (field, value) in &self.defaults {
            // Kind correctness is checked at startup; a mismatch here
            // would be a bug, not bad input.
            if let Err(err) = state.set(*field, value.clone()) {
                tracing::warn!(view = self.id, error = %err, "invalid view default ignored");
            }
        }
        state
    }

    pub fn ui_rule(&self, field: Field) -> Option<&UiElement> {
        self.ui
            .iter()
            .find(|(rule_field, _)| *rule_field == field)
            .map(|(_, rule)| rule)
    }
}

/// All registered views. Declaration order of shorthand views is their
/// activation precedence.
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    views: Vec<ViewConfig>,
    default_id: &'static str,
}

impl ViewRegistry {
    pub fn new(views: Vec<ViewConfig>, default_id: &'static str) -> ViewRegistry {
        ViewRegistry { views, default_id }
    }

    pub fn views(&self) -> &[ViewConfig] {
        &self.views
    }

    pub fn default_view(&self) -> &ViewConfig {
        self.by_id(self.default_id)
            .expect("default view validated at startup")
    }

    pub fn by_id(&self, id: &str) -> Option<&ViewConfig> {
        self.views.iter().find(|view| view.id == id)
    }

    /// Resolve the active view from a parsed URL query.
    pub fn active_view(&self, query: &Query) -> &ViewConfig {
        for view in &self.views {
            let Some(shorthand) = view.shorthand else {
                continue;
            };
            if codec::decode(shorthand, query) == Some(FieldValue::Bool(true)) {
                return view;
            }
        }
        if let Some(id) = query.first(VIEW_KEY)
            && let Some(view) = self.by_id(id)
        {
            return view;
        }
        self.default_view()
    }

    /// Resolve the active view after a state change.
    ///
    /// A shorthand field turned on switches into its view; the current
    /// view's shorthand turned off falls back to the default view;
    /// shorthand-less views are sticky.
    pub fn active_view_for_state(&self, state: &State, current_id: &str) -> &ViewConfig {
        for view in &self.views {
            let Some(shorthand) = view.shorthand else {
                continue;
            };
            if state.bool(shorthand) == Ok(true) {
                return view;
            }
        }
        match self.by_id(current_id) {
            Some(view) if view.shorthand.is_none() => view,
            _ => self.default_view(),
        }
    }

    /// Startup configuration checks. Errors abort initialization.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut ids = std::collections::HashSet::new();
        let mut shorthands = std::collections::HashSet::new();

        if self.by_id(self.default_id).is_none() {
            errors.push(format!("default view '{}' is not registered", self.default_id));
        }

        for view in &self.views {
            if !ids.insert(view.id) {
                errors.push(format!("duplicate view id '{}'", view.id));
            }
            if let Some(shorthand) = view.shorthand {
                if shorthand.kind() != Kind::Bool {
                    errors.push(format!(
                        "{}: shorthand field {} must be a bool field",
                        view.id, shorthand
                    ));
                }
                if !shorthands.insert(shorthand) {
                    errors.push(format!(
                        "{}: shorthand field {} already activates another view",
                        view.id, shorthand
                    ));
                }
            }
            for (field, value) in &view.defaults {
                if value.kind() != field.kind() {
                    errors.push(format!(
                        "{}: default for {} has kind {:?}, field wants {:?}",
                        view.id,
                        field,
                        value.kind(),
                        field.kind()
                    ));
                }
            }
            for (field, rule) in &view.ui {
                if let UiElement::Visible {
                    fixed_value: Some(_),
                    ..
                } = rule
                    && field.kind() != Kind::Bool
                {
                    errors.push(format!(
                        "{}: fixed-value ui rule on non-bool field {}",
                        view.id, field
                    ));
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::parse_query;

    fn view(id: &'static str, shorthand: Option<Field>) -> ViewConfig {
        ViewConfig {
            id,
            shorthand,
            defaults: Vec::new(),
            ui: Vec::new(),
            constraints: Vec::new(),
        }
    }

    fn registry() -> ViewRegistry {
        ViewRegistry::new(
            vec![
                view("zscore", Some(Field::Zscores)),
                view("excess", Some(Field::Excess)),
                view("explorer", None),
            ],
            "explorer",
        )
    }

    #[test]
    fn shorthand_precedence_is_declaration_order() {
        let registry = registry();
        // Both shorthands set: the earlier declaration wins.
        assert_eq!(registry.active_view(&parse_query("zs=1&e=1")).id, "zscore");
        assert_eq!(registry.active_view(&parse_query("e=1")).id, "excess");
    }

    #[test]
    fn generic_view_param_is_checked_after_shorthands() {
        let registry = registry();
        assert_eq!(registry.active_view(&parse_query("v=excess")).id, "excess");
        assert_eq!(registry.active_view(&parse_query("zs=1&v=excess")).id, "zscore");
    }

    #[test]
    fn unknown_or_absent_view_falls_back_to_default() {
        let registry = registry();
        assert_eq!(registry.active_view(&parse_query("")).id, "explorer");
        assert_eq!(registry.active_view(&parse_query("v=nope")).id, "explorer");
        // zs=0 is an explicit off, not an activation.
        assert_eq!(registry.active_view(&parse_query("zs=0")).id, "explorer");
    }

    #[test]
    fn state_based_resolution_switches_and_falls_back() {
        let registry = registry();
        let state = State::base()
            .with(Field::Excess, FieldValue::Bool(true))
            .expect("patch");
        assert_eq!(registry.active_view_for_state(&state, "explorer").id, "excess");

        // Shorthand off again: fall back to the default view.
        let state = State::base();
        assert_eq!(registry.active_view_for_state(&state, "excess").id, "explorer");
        // Shorthand-less views are sticky.
        assert_eq!(registry.active_view_for_state(&state, "explorer").id, "explorer");
    }

    #[test]
    fn validate_flags_duplicate_ids_and_shorthands() {
        let registry = ViewRegistry::new(
            vec![
                view("a", Some(Field::Zscores)),
                view("a", Some(Field::Zscores)),
            ],
            "missing",
        );
        let errors = registry.validate();
        assert!(errors.iter().any(|e| e.contains("duplicate view id")));
        assert!(errors.iter().any(|e| e.contains("already activates")));
        assert!(errors.iter().any(|e| e.contains("default view")));
    }

    #[test]
    fn validate_flags_kind_mismatches() {
        let mut bad = view("bad", None);
        bad.defaults = vec![(Field::ShowBaseline, FieldValue::text("yes"))];
        bad.ui = vec![(Field::ChartStyle, UiElement::fixed(true))];
        let registry = ViewRegistry::new(vec![bad], "bad");
        let errors = registry.validate();
        assert!(errors.iter().any(|e| e.contains("default for showBaseline")));
        assert!(errors.iter().any(|e| e.contains("fixed-value ui rule")));
    }
}
