//! HTTP route handlers for the UI API.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use resolver::core::field::{Field, FieldValue, Kind};
use resolver::core::resolver::ResolvedState;
use resolver::core::state::ChangeSource;
use resolver::session::Navigation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{AppState, ChangeEvent};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/url", get(get_url))
        .route("/change", post(post_change))
        .route("/navigate", post(post_navigate))
        .route("/reset", post(post_reset))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct StateResponse {
    #[serde(flatten)]
    resolved: ResolvedState,
    query: String,
    refreshing: bool,
}

type ApiError = (StatusCode, String);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

/// GET /api/state - current resolved state, canonical query, and
/// whether a refresh is in flight.
async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    let session = state.session.lock().await;
    let refreshing = state.queue.is_running().await;
    Json(StateResponse {
        resolved: session.resolved().clone(),
        query: session.query().to_string(),
        refreshing,
    })
}

/// GET /api/url - canonical query string for the current state.
async fn get_url(State(state): State<AppState>) -> String {
    state.session.lock().await.query().to_string()
}

#[derive(Deserialize)]
struct ChangeRequest {
    field: String,
    value: Value,
}

/// POST /api/change - apply one field edit through the resolution
/// pipeline and kick off the classified refresh.
async fn post_change(
    State(state): State<AppState>,
    Json(req): Json<ChangeRequest>,
) -> Result<Json<StateResponse>, ApiError> {
    let field = Field::from_name(&req.field)
        .ok_or_else(|| bad_request(format!("unknown field '{}'", req.field)))?;
    let value = json_to_value(field, &req.value)?;

    let mut session = state.session.lock().await;
    let outcome = session
        .apply_change(field, value, ChangeSource::User)
        .map_err(|err| bad_request(format!("{:#}", err)))?;

    let _ = state.event_tx.send(ChangeEvent::StateChanged {
        query: outcome.query.clone(),
    });
    if let Some(key) = outcome.refresh {
        state.spawn_refresh(key);
    }

    Ok(Json(StateResponse {
        resolved: session.resolved().clone(),
        query: outcome.query,
        refreshing: state.queue.is_running().await,
    }))
}

#[derive(Deserialize)]
struct NavigateRequest {
    query: String,
}

#[derive(Serialize)]
struct NavigateResponse {
    /// True when the navigation was the echo of the server's own URL
    /// rewrite and no resolution ran.
    ignored: bool,
    #[serde(flatten)]
    state: StateResponse,
}

/// POST /api/navigate - report an address-bar change (back/forward or
/// pasted URL).
async fn post_navigate(
    State(state): State<AppState>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<NavigateResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let nav = session
        .handle_url(&req.query)
        .map_err(|err| bad_request(format!("{:#}", err)))?;

    let ignored = match nav {
        Navigation::Ignored => true,
        Navigation::Applied(outcome) => {
            let _ = state.event_tx.send(ChangeEvent::StateChanged {
                query: outcome.query.clone(),
            });
            if let Some(key) = outcome.refresh {
                state.spawn_refresh(key);
            }
            false
        }
    };

    Ok(Json(NavigateResponse {
        ignored,
        state: StateResponse {
            resolved: session.resolved().clone(),
            query: session.query().to_string(),
            refreshing: state.queue.is_running().await,
        },
    }))
}

/// POST /api/reset - discard user overrides and return to defaults.
async fn post_reset(State(state): State<AppState>) -> Result<Json<StateResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let outcome = session
        .reset()
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err)))?;

    let _ = state.event_tx.send(ChangeEvent::StateChanged {
        query: outcome.query.clone(),
    });
    if let Some(key) = outcome.refresh {
        state.spawn_refresh(key);
    }

    Ok(Json(StateResponse {
        resolved: session.resolved().clone(),
        query: outcome.query,
        refreshing: state.queue.is_running().await,
    }))
}

/// Convert a JSON request value into the field's typed value.
fn json_to_value(field: Field, raw: &Value) -> Result<FieldValue, ApiError> {
    match (field.kind(), raw) {
        (Kind::Bool, Value::Bool(b)) => Ok(FieldValue::Bool(*b)),
        (Kind::Int, Value::Number(n)) => n
            .as_i64()
            .map(FieldValue::Int)
            .ok_or_else(|| bad_request(format!("{}: expected an integer", field))),
        (Kind::Text, Value::String(s)) => Ok(FieldValue::Text(s.clone())),
        (Kind::List, Value::Array(items)) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => values.push(s.clone()),
                    _ => return Err(bad_request(format!("{}: expected a string array", field))),
                }
            }
            Ok(FieldValue::List(values))
        }
        (kind, _) => Err(bad_request(format!(
            "{}: expected a {:?} value",
            field, kind
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_convert_per_kind() {
        assert_eq!(
            json_to_value(Field::ShowTotals, &json!(false)).expect("bool"),
            FieldValue::Bool(false)
        );
        assert_eq!(
            json_to_value(Field::BaselineWindow, &json!(7)).expect("int"),
            FieldValue::Int(7)
        );
        assert_eq!(
            json_to_value(Field::Metric, &json!("asmr")).expect("text"),
            FieldValue::text("asmr")
        );
        assert_eq!(
            json_to_value(Field::Countries, &json!(["DEU", "FRA"])).expect("list"),
            FieldValue::list(&["DEU", "FRA"])
        );
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        assert!(json_to_value(Field::ShowTotals, &json!("yes")).is_err());
        assert!(json_to_value(Field::BaselineWindow, &json!(1.5)).is_err());
        assert!(json_to_value(Field::Countries, &json!([1, 2])).is_err());
    }
}
