//! End-to-end resolution scenarios over the real catalog.

use resolver::catalog;
use resolver::core::field::{Field, FieldValue};
use resolver::core::resolver::{ResolvedState, resolve_change, resolve_initial};
use resolver::core::state::{ChangeSource, StateChange};
use resolver::session::Session;
use resolver::test_support::RecordingRefresher;

fn resolve(query: &str) -> ResolvedState {
    let registry = catalog::view_registry();
    let globals = catalog::global_constraints();
    resolve_initial(query, &registry, &globals).expect("resolve")
}

fn change(prev: &ResolvedState, field: Field, value: FieldValue) -> ResolvedState {
    let registry = catalog::view_registry();
    let globals = catalog::global_constraints();
    resolve_change(
        &StateChange {
            field,
            value,
            source: ChangeSource::User,
        },
        prev,
        &registry,
        &globals,
    )
    .expect("resolve change")
}

/// Scenario A: zs=1&e=1 resolves to the zscore view (fixed shorthand
/// precedence) and excess-only fields stay inactive.
#[test]
fn zscore_shorthand_wins_over_excess() {
    let resolved = resolve("zs=1&e=1");
    assert_eq!(resolved.view, "zscore");
    assert_eq!(resolved.state.bool(Field::Zscores), Ok(true));

    let cumulative = resolved.ui[&Field::Cumulative];
    assert!(!cumulative.visible);
    assert!(cumulative.disabled);
    assert_eq!(resolved.state.bool(Field::Cumulative), Ok(false));

    // The baseline toggle is shown but locked off.
    let baseline = resolved.ui[&Field::ShowBaseline];
    assert!(baseline.visible);
    assert!(baseline.disabled);
    assert_eq!(resolved.state.bool(Field::ShowBaseline), Ok(false));
}

/// Scenario B: the hard matrix constraint overrides the user's sb=1,
/// and the log records it as constraint (p2).
#[test]
fn matrix_constraint_beats_url_baseline() {
    let resolved = resolve("cs=matrix&sb=1");
    assert_eq!(resolved.state.text(Field::ChartStyle), Ok("matrix"));
    assert_eq!(resolved.state.bool(Field::ShowBaseline), Ok(false));
    assert!(resolved.user_overrides.contains(&Field::ShowBaseline));

    let entry = resolved
        .log
        .changes
        .iter()
        .find(|entry| entry.field == Field::ShowBaseline)
        .expect("log entry for showBaseline");
    assert_eq!(entry.priority.to_string(), "constraint (p2)");
    assert_eq!(entry.url_key, "sb");
    assert_eq!(entry.new_value, FieldValue::Bool(false));

    // The log carries full before/after snapshots of the cycle.
    assert_eq!(resolved.log.before.bool(Field::ShowBaseline), Ok(true));
    assert_eq!(resolved.log.after, resolved.state);
}

/// Scenario C: turning totals off forces totals-only off, even when it
/// was a user override; toggling cumulative alone leaves it untouched.
#[test]
fn totals_off_forces_totals_only_off() {
    let prev = resolve("to=1");
    assert_eq!(prev.state.bool(Field::ShowTotalsOnly), Ok(true));
    assert!(prev.user_overrides.contains(&Field::ShowTotalsOnly));

    let resolved = change(&prev, Field::ShowTotals, FieldValue::Bool(false));
    assert_eq!(resolved.state.bool(Field::ShowTotals), Ok(false));
    assert_eq!(resolved.state.bool(Field::ShowTotalsOnly), Ok(false));

    let entry = resolved
        .log
        .changes
        .iter()
        .find(|entry| entry.field == Field::ShowTotalsOnly)
        .expect("log entry for showTotalsOnly");
    assert_eq!(entry.priority.to_string(), "constraint (p1)");
}

#[test]
fn cumulative_alone_leaves_totals_only_untouched() {
    let prev = resolve("");
    let resolved = change(&prev, Field::Cumulative, FieldValue::Bool(true));
    assert_eq!(resolved.state.bool(Field::ShowTotalsOnly), Ok(false));
    assert!(
        resolved
            .log
            .changes
            .iter()
            .all(|entry| entry.field != Field::ShowTotalsOnly)
    );
}

/// Override protection: the only matching constraint on showBaseline is
/// user-overridable, so the URL value survives.
#[test]
fn url_override_survives_overridable_constraint() {
    let resolved = resolve("bm=none&sb=1");
    assert_eq!(resolved.state.text(Field::BaselineMethod), Ok("none"));
    assert_eq!(resolved.state.bool(Field::ShowBaseline), Ok(true));

    // Without the override the rule applies.
    let resolved = resolve("bm=none");
    assert_eq!(resolved.state.bool(Field::ShowBaseline), Ok(false));
}

/// An override whose value equals the effective default keeps its key
/// in the canonical query, so the protected value survives
/// re-resolution.
#[test]
fn override_at_default_value_survives_canonical_round_trip() {
    let registry = catalog::view_registry();
    let first = resolve("bm=none&sb=1");
    assert_eq!(first.state.bool(Field::ShowBaseline), Ok(true));

    let canonical = first.canonical_query(&registry);
    assert_eq!(canonical, "bm=none&sb=1");

    let second = resolve(&canonical);
    assert_eq!(second.state.bool(Field::ShowBaseline), Ok(true));
    assert_eq!(second.state, first.state);
    assert!(second.user_overrides.contains(&Field::ShowBaseline));
}

/// Idempotence law: re-resolving the canonical re-encoding of a
/// resolved state yields the same state.
#[test]
fn canonical_re_encoding_is_idempotent() {
    let registry = catalog::view_registry();
    for query in [
        "",
        "zs=1&e=1",
        "cs=matrix&sb=1",
        "e=1&cu=1",
        "c=DEU&c=FRA&bw=3&m=asmr",
        "v=excess&st=0",
        "bm=none",
        // Override equal to the effective default: the key must be
        // re-emitted or the override protecting it is lost.
        "bm=none&sb=1",
        "c=USA",
    ] {
        let first = resolve(query);
        let canonical = first.canonical_query(&registry);
        let second = resolve(&canonical);
        assert_eq!(first.state, second.state, "query '{}'", query);
        assert_eq!(first.view, second.view, "query '{}'", query);
        assert_eq!(
            canonical,
            second.canonical_query(&registry),
            "query '{}'",
            query
        );
    }
}

/// A chain of changes lands on the same state as resolving its final
/// canonical URL from scratch.
#[test]
fn change_chain_matches_fresh_resolution() {
    let registry = catalog::view_registry();

    let s0 = resolve("");
    let s1 = change(&s0, Field::Countries, FieldValue::list(&["DEU", "SWE"]));
    let s2 = change(&s1, Field::ChartStyle, FieldValue::text("matrix"));
    let s3 = change(&s2, Field::ShowTotals, FieldValue::Bool(false));

    let fresh = resolve(&s3.canonical_query(&registry));
    assert_eq!(fresh.state, s3.state);
    assert_eq!(fresh.view, s3.view);
}

/// Toggling a shorthand field switches views and applies the entered
/// view's defaults to non-overridden fields.
#[test]
fn shorthand_change_switches_view() {
    let prev = resolve("");
    let resolved = change(&prev, Field::Excess, FieldValue::Bool(true));
    assert_eq!(resolved.view, "excess");
    // Entered-view default, not user-overridden.
    assert_eq!(resolved.state.text(Field::ChartStyle), Ok("bar"));

    let back = change(&resolved, Field::Excess, FieldValue::Bool(false));
    assert_eq!(back.view, "explorer");
}

/// A user override made before a view switch survives the entered
/// view's defaults.
#[test]
fn user_override_survives_view_entry() {
    let prev = resolve("");
    let styled = change(&prev, Field::ChartStyle, FieldValue::text("line"));
    let resolved = change(&styled, Field::Excess, FieldValue::Bool(true));
    assert_eq!(resolved.view, "excess");
    // The excess default chartStyle=bar must not clobber the override.
    assert_eq!(resolved.state.text(Field::ChartStyle), Ok("line"));
}

/// The excess view's hard rule repairs a missing baseline method.
#[test]
fn excess_view_requires_baseline_method() {
    let resolved = resolve("e=1&bm=none");
    assert_eq!(resolved.view, "excess");
    assert_eq!(resolved.state.text(Field::BaselineMethod), Ok("mean"));

    let entry = resolved
        .log
        .changes
        .iter()
        .find(|entry| entry.field == Field::BaselineMethod)
        .expect("log entry for baselineMethod");
    assert_eq!(entry.priority.to_string(), "constraint (p2)");
}

/// Malformed URL tokens fail soft to defaults, silently.
#[test]
fn malformed_tokens_resolve_to_defaults() {
    let resolved = resolve("cs=donut&bw=999&sb=yes");
    assert_eq!(resolved.state.text(Field::ChartStyle), Ok("line"));
    assert_eq!(resolved.state.int(Field::BaselineWindow), Ok(5));
    assert_eq!(resolved.state.bool(Field::ShowBaseline), Ok(true));
    assert!(resolved.user_overrides.is_empty());
}

/// The session wires resolution output into classified refresh keys.
#[tokio::test]
async fn session_enqueues_classified_refreshes() {
    let refresher = RecordingRefresher::default();
    let mut session = Session::start("", refresher.clone()).expect("start");
    let queue = session.queue();

    let outcome = session
        .apply_change(
            Field::Countries,
            FieldValue::list(&["DEU"]),
            resolver::core::state::ChangeSource::User,
        )
        .expect("change");
    let key = outcome.refresh.expect("refresh key");
    queue.enqueue(&key).await.expect("enqueue");

    let outcome = session
        .apply_change(
            Field::BaselineWindow,
            FieldValue::Int(3),
            resolver::core::state::ChangeSource::User,
        )
        .expect("change");
    let key = outcome.refresh.expect("refresh key");
    queue.enqueue(&key).await.expect("enqueue");

    let runs = refresher.runs.lock().await.clone();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].0, "countries");
    assert_eq!(
        runs[0].1,
        resolver::core::classifier::RefreshKind::Refetch
    );
    assert_eq!(runs[1].0, "baselineWindow");
    assert_eq!(
        runs[1].1,
        resolver::core::classifier::RefreshKind::Recompute
    );
}
