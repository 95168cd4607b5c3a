//! URL query-string codec for configuration state.
//!
//! The query string is the authoritative encoding of a `State`. Each
//! field has one fixed short key; a key is omitted when the field holds
//! the active view's effective default, keeping URLs minimal and
//! canonical. Booleans encode as `0`/`1`, lists as repeated keys, text
//! percent-encoded. Malformed tokens fail soft: the field falls back to
//! its default with no user-visible error.

use crate::core::field::{Field, FieldValue, Kind};
use crate::core::state::State;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use url::form_urlencoded;

/// Parsed query string: key → values in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: BTreeMap<String, Vec<String>>,
}

impl Query {
    pub fn first(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn all(&self, key: &str) -> &[String] {
        self.params.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }
}

/// Parse a raw query string (with or without a leading `?`).
///
/// Empty pairs and pairs without `=` are tolerated; keys and values are
/// decoded as `application/x-www-form-urlencoded`.
pub fn parse_query(raw: &str) -> Query {
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    Query { params }
}

/// Decode one field from a parsed query.
///
/// Returns `None` when the key is absent or every token is malformed
/// (the caller falls back to the field's default).
pub fn decode(field: Field, query: &Query) -> Option<FieldValue> {
    let key = field.url_key();
    if !query.contains(key) {
        return None;
    }
    let decoded = match field.kind() {
        Kind::Bool => match query.first(key) {
            Some("1") => Some(FieldValue::Bool(true)),
            Some("0") => Some(FieldValue::Bool(false)),
            _ => None,
        },
        Kind::Int => query
            .first(key)
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|value| match field.int_range() {
                Some((lo, hi)) => (lo..=hi).contains(value),
                None => true,
            })
            .map(FieldValue::Int),
        Kind::Text => query
            .first(key)
            .filter(|raw| !raw.is_empty())
            .filter(|raw| match field.allowed_tokens() {
                Some(tokens) => tokens.contains(raw),
                None => true,
            })
            .map(|raw| FieldValue::Text(raw.to_string())),
        Kind::List => {
            let values: Vec<String> = query
                .all(key)
                .iter()
                .filter(|v| !v.is_empty())
                .cloned()
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(FieldValue::List(values))
            }
        }
    };
    if decoded.is_none() {
        debug!(field = %field, key, "malformed url token, using default");
    }
    decoded
}

/// Decode every field present in the query. Malformed entries are
/// silently absent from the result.
pub fn decode_all(query: &Query) -> BTreeMap<Field, FieldValue> {
    Field::ALL
        .iter()
        .filter_map(|field| decode(*field, query).map(|value| (*field, value)))
        .collect()
}

/// Encode a state as `(key, value)` pairs in canonical field order.
///
/// Fields holding their effective default (`defaults`) are omitted,
/// except those in `force`: user-overridden fields must keep their key
/// so the override survives a decode of the resulting query.
pub fn encode_pairs(
    state: &State,
    defaults: &State,
    force: &BTreeSet<Field>,
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for field in Field::ALL {
        let value = state.get(*field);
        if !force.contains(field) && value == defaults.get(*field) {
            continue;
        }
        let key = field.url_key();
        match value {
            FieldValue::Bool(v) => {
                pairs.push((key.to_string(), if *v { "1" } else { "0" }.to_string()));
            }
            FieldValue::Int(v) => pairs.push((key.to_string(), v.to_string())),
            FieldValue::Text(v) => pairs.push((key.to_string(), v.clone())),
            FieldValue::List(values) => {
                for v in values {
                    pairs.push((key.to_string(), v.clone()));
                }
            }
        }
    }
    pairs
}

/// Join pairs into a form-urlencoded query string.
pub fn build_query(pairs: &[(String, String)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_pairs_and_decodes() {
        let query = parse_query("?cs=matrix&c=USA&c=DEU&dr=2020%2D2021");
        assert_eq!(query.first("cs"), Some("matrix"));
        assert_eq!(query.all("c"), ["USA", "DEU"]);
        assert_eq!(query.first("dr"), Some("2020-2021"));
    }

    #[test]
    fn parse_tolerates_junk_pairs() {
        let query = parse_query("&=x&sb&cs=line&%zz=1");
        assert_eq!(query.first("cs"), Some("line"));
        assert_eq!(query.first("sb"), Some(""));
        assert!(!query.contains(""));
        // A junk key is kept but matches no field.
        assert_eq!(decode_all(&query).len(), 1);
    }

    /// Round-trip law: decode(encode(v)) == v for non-default values.
    #[test]
    fn round_trips_every_field_kind() {
        let defaults = State::base();
        let mut state = State::base();
        state.set(Field::ChartStyle, FieldValue::text("matrix")).expect("set");
        state.set(Field::BaselineWindow, FieldValue::Int(3)).expect("set");
        state.set(Field::ShowBaseline, FieldValue::Bool(false)).expect("set");
        state
            .set(Field::Countries, FieldValue::list(&["DEU", "FRA"]))
            .expect("set");
        state
            .set(Field::DateRange, FieldValue::text("2020 2021"))
            .expect("set");

        let raw = build_query(&encode_pairs(&state, &defaults, &BTreeSet::new()));
        let decoded = decode_all(&parse_query(&raw));

        assert_eq!(decoded.get(&Field::ChartStyle), Some(&FieldValue::text("matrix")));
        assert_eq!(decoded.get(&Field::BaselineWindow), Some(&FieldValue::Int(3)));
        assert_eq!(decoded.get(&Field::ShowBaseline), Some(&FieldValue::Bool(false)));
        assert_eq!(
            decoded.get(&Field::Countries),
            Some(&FieldValue::list(&["DEU", "FRA"]))
        );
        assert_eq!(
            decoded.get(&Field::DateRange),
            Some(&FieldValue::text("2020 2021"))
        );
    }

    /// Omission law: encoding a default value yields no key.
    #[test]
    fn default_values_are_omitted() {
        let defaults = State::base();
        let pairs = encode_pairs(&State::base(), &defaults, &BTreeSet::new());
        assert!(pairs.is_empty());
    }

    /// User-overridden fields keep their key even at the default value,
    /// so decoding the encoded query reproduces the override.
    #[test]
    fn forced_fields_are_emitted_at_default_values() {
        let defaults = State::base();
        let force: BTreeSet<Field> = [Field::ShowBaseline, Field::Countries]
            .into_iter()
            .collect();
        let pairs = encode_pairs(&State::base(), &defaults, &force);
        assert_eq!(
            pairs,
            vec![
                ("sb".to_string(), "1".to_string()),
                ("c".to_string(), "USA".to_string()),
            ]
        );
    }

    #[test]
    fn bools_encode_as_zero_one() {
        let defaults = State::base();
        let state = State::base()
            .with(Field::ShowBaseline, FieldValue::Bool(false))
            .expect("patch");
        let pairs = encode_pairs(&state, &defaults, &BTreeSet::new());
        assert_eq!(pairs, vec![("sb".to_string(), "0".to_string())]);
    }

    #[test]
    fn malformed_tokens_fall_back_to_none() {
        let query = parse_query("sb=yes&bw=99&cs=donut&m=");
        assert_eq!(decode(Field::ShowBaseline, &query), None);
        assert_eq!(decode(Field::BaselineWindow, &query), None);
        assert_eq!(decode(Field::ChartStyle, &query), None);
        assert_eq!(decode(Field::Metric, &query), None);
    }

    #[test]
    fn omission_respects_view_defaults() {
        // When the effective default already says bar, cs=bar is omitted
        // while the base-default line would be emitted.
        let view_defaults = State::base()
            .with(Field::ChartStyle, FieldValue::text("bar"))
            .expect("patch");
        let state = view_defaults.clone();
        assert!(encode_pairs(&state, &view_defaults, &BTreeSet::new()).is_empty());

        let back_to_line = state
            .with(Field::ChartStyle, FieldValue::text("line"))
            .expect("patch");
        assert_eq!(
            encode_pairs(&back_to_line, &view_defaults, &BTreeSet::new()),
            vec![("cs".to_string(), "line".to_string())]
        );
    }

    #[test]
    fn build_query_round_trips_reserved_characters() {
        let pairs = vec![("dr".to_string(), "a b&c=d%e".to_string())];
        let query = parse_query(&build_query(&pairs));
        assert_eq!(query.first("dr"), Some("a b&c=d%e"));
    }
}
