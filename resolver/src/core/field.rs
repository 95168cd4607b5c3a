//! The closed set of configurable fields and their typed values.
//!
//! Every field the UI can configure is a variant here. The enum is the
//! single source of truth for URL keys, value kinds, allowed tokens and
//! base defaults; there is no string-keyed dynamic lookup anywhere in
//! the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A configurable field of the exploration UI.
///
/// Serde names match the logical camelCase field names used by the
/// rendering layer (`showBaseline`, `dateRange`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    ChartStyle,
    Metric,
    BaselineMethod,
    BaselineWindow,
    ShowBaseline,
    ShowPredictionInterval,
    Zscores,
    Excess,
    Cumulative,
    ShowTotals,
    ShowTotalsOnly,
    Countries,
    AgeGroups,
    DateRange,
    ShowPercentage,
}

/// Value kind a field accepts. `set` and the codec reject mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Text,
    List,
}

/// A field value. Untagged so JSON reads naturally
/// (`true`, `5`, `"matrix"`, `["USA","DEU"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }

    pub fn list(values: &[&str]) -> Self {
        FieldValue::List(values.iter().map(|v| (*v).to_string()).collect())
    }

    pub fn kind(&self) -> Kind {
        match self {
            FieldValue::Bool(_) => Kind::Bool,
            FieldValue::Int(_) => Kind::Int,
            FieldValue::Text(_) => Kind::Text,
            FieldValue::List(_) => Kind::List,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
            FieldValue::List(v) => write!(f, "{}", v.join(",")),
        }
    }
}

impl Field {
    /// Every field, in canonical URL-encoding order.
    pub const ALL: &'static [Field] = &[
        Field::ChartStyle,
        Field::Metric,
        Field::BaselineMethod,
        Field::BaselineWindow,
        Field::ShowBaseline,
        Field::ShowPredictionInterval,
        Field::Zscores,
        Field::Excess,
        Field::Cumulative,
        Field::ShowTotals,
        Field::ShowTotalsOnly,
        Field::Countries,
        Field::AgeGroups,
        Field::DateRange,
        Field::ShowPercentage,
    ];

    /// Logical camelCase name, as used in JSON and refresh keys.
    pub fn name(self) -> &'static str {
        match self {
            Field::ChartStyle => "chartStyle",
            Field::Metric => "metric",
            Field::BaselineMethod => "baselineMethod",
            Field::BaselineWindow => "baselineWindow",
            Field::ShowBaseline => "showBaseline",
            Field::ShowPredictionInterval => "showPredictionInterval",
            Field::Zscores => "zscores",
            Field::Excess => "excess",
            Field::Cumulative => "cumulative",
            Field::ShowTotals => "showTotals",
            Field::ShowTotalsOnly => "showTotalsOnly",
            Field::Countries => "countries",
            Field::AgeGroups => "ageGroups",
            Field::DateRange => "dateRange",
            Field::ShowPercentage => "showPercentage",
        }
    }

    /// Short URL query key.
    pub fn url_key(self) -> &'static str {
        match self {
            Field::ChartStyle => "cs",
            Field::Metric => "m",
            Field::BaselineMethod => "bm",
            Field::BaselineWindow => "bw",
            Field::ShowBaseline => "sb",
            Field::ShowPredictionInterval => "pi",
            Field::Zscores => "zs",
            Field::Excess => "e",
            Field::Cumulative => "cu",
            Field::ShowTotals => "st",
            Field::ShowTotalsOnly => "to",
            Field::Countries => "c",
            Field::AgeGroups => "ag",
            Field::DateRange => "dr",
            Field::ShowPercentage => "pct",
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            Field::ChartStyle
            | Field::Metric
            | Field::BaselineMethod
            | Field::DateRange => Kind::Text,
            Field::BaselineWindow => Kind::Int,
            Field::Countries | Field::AgeGroups => Kind::List,
            _ => Kind::Bool,
        }
    }

    /// Allowed tokens for enumerated text fields. `None` means free text.
    pub fn allowed_tokens(self) -> Option<&'static [&'static str]> {
        match self {
            Field::ChartStyle => Some(&["line", "bar", "matrix"]),
            Field::Metric => Some(&["cmr", "asmr", "deaths", "le"]),
            Field::BaselineMethod => Some(&["mean", "linear", "none"]),
            _ => None,
        }
    }

    /// Inclusive range for int fields.
    pub fn int_range(self) -> Option<(i64, i64)> {
        match self {
            Field::BaselineWindow => Some((1, 10)),
            _ => None,
        }
    }

    /// Base default, before any view defaults are overlaid.
    pub fn base_default(self) -> FieldValue {
        match self {
            Field::ChartStyle => FieldValue::text("line"),
            Field::Metric => FieldValue::text("cmr"),
            Field::BaselineMethod => FieldValue::text("mean"),
            Field::BaselineWindow => FieldValue::Int(5),
            Field::ShowBaseline => FieldValue::Bool(true),
            Field::ShowPredictionInterval => FieldValue::Bool(false),
            Field::Zscores => FieldValue::Bool(false),
            Field::Excess => FieldValue::Bool(false),
            Field::Cumulative => FieldValue::Bool(false),
            Field::ShowTotals => FieldValue::Bool(true),
            Field::ShowTotalsOnly => FieldValue::Bool(false),
            Field::Countries => FieldValue::list(&["USA"]),
            Field::AgeGroups => FieldValue::list(&["all"]),
            Field::DateRange => FieldValue::text("2015-2023"),
            Field::ShowPercentage => FieldValue::Bool(false),
        }
    }

    /// Look a field up by its logical name.
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Look a field up by its URL key.
    pub fn from_url_key(key: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.url_key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
