//! Tests for the condition set engine.
//!
//! Covers blank-output behavior before data arrives, priority
//! reordering, live edits, and subscription lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use vigil_types::{Combination, Operator, TelemetryValue};

use super::definition::{Condition, ConditionSetDefinition, Criterion, CriterionPatch};
use super::engine::{ConditionSetEngine, EngineEvent, EngineOptions};
use super::output::{OutputState, OutputValue};
use crate::telemetry::{
    Subscription, SubscriptionError, TelemetryKey, TelemetryProvider, TelemetrySample,
};

fn ts(secs: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, secs)
        .unwrap()
}

fn make_criterion(id: &str, source: &str, operator: Operator, operand: f64) -> Criterion {
    Criterion {
        id: id.to_string(),
        source: source.to_string(),
        field: "sine".to_string(),
        operator,
        operand: Some(TelemetryValue::Number(operand)),
        operand_high: None,
    }
}

fn make_condition(id: &str, output: &str, criteria: Vec<Criterion>) -> Condition {
    Condition {
        id: id.to_string(),
        name: id.to_string(),
        criteria,
        combination: Combination::All,
        output: output.to_string(),
        is_default: false,
    }
}

fn make_set(conditions: Vec<Condition>) -> ConditionSetDefinition {
    let mut conditions = conditions;
    conditions.push(Condition::fallback("dflt", "Default"));
    ConditionSetDefinition {
        id: "set".to_string(),
        name: "Test Set".to_string(),
        conditions,
    }
}

fn sample(source: &str, value: f64, secs: u32) -> TelemetrySample {
    TelemetrySample::new(source, "sine", value, ts(secs))
}

/// Provider that tracks live subscription counts per key and can be told
/// to fail specific sources.
#[derive(Default)]
struct CountingProvider {
    active: Arc<Mutex<Vec<TelemetryKey>>>,
    failing_sources: Vec<String>,
    subscribe_calls: AtomicUsize,
}

impl CountingProvider {
    fn failing(sources: &[&str]) -> Self {
        Self {
            failing_sources: sources.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn live_keys(&self) -> Vec<TelemetryKey> {
        self.active.lock().unwrap().clone()
    }
}

impl TelemetryProvider for CountingProvider {
    fn subscribe(&self, key: &TelemetryKey) -> Result<Subscription, SubscriptionError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_sources.contains(&key.source) {
            return Err(SubscriptionError::UnknownSource(key.source.clone()));
        }
        self.active.lock().unwrap().push(key.clone());
        let active = Arc::clone(&self.active);
        let released = key.clone();
        Ok(Subscription::new(
            key.clone(),
            Box::new(move || {
                let mut live = active.lock().unwrap();
                if let Some(index) = live.iter().position(|k| *k == released) {
                    live.remove(index);
                }
            }),
        ))
    }
}

fn spawn_engine(
    definition: ConditionSetDefinition,
    provider: Arc<CountingProvider>,
) -> ConditionSetEngine {
    ConditionSetEngine::new(definition, provider, EngineOptions::default()).unwrap()
}

fn output_changes(events: Vec<EngineEvent>) -> Vec<OutputState> {
    events
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::OutputChanged(state) => Some(state),
            _ => None,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Blank output before data arrives
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_default_only_set_resolves_to_default_immediately() {
    let provider = Arc::new(CountingProvider::default());
    let mut engine = spawn_engine(
        ConditionSetDefinition::new("cs1", "Unnamed Condition Set"),
        provider,
    );

    let output = engine.current_output();
    assert_eq!(output.value, OutputValue::Value("Default".to_string()));
    assert_eq!(output.active_condition.as_deref(), Some("cs1.default"));

    let changes = output_changes(engine.take_events());
    assert_eq!(changes.len(), 1, "initial resolution is itself a change");
}

#[test]
fn test_blank_until_first_sample_from_delayed_source() {
    // Two conditions on the same not-yet-delivering source; before the
    // first sample lands the output must read exactly the blank
    // sentinel, not either condition's output and not the default.
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![
        make_condition(
            "positive",
            "Positive",
            vec![make_criterion("crit1", "delayed", Operator::GreaterThanOrEqualTo, 0.0)],
        ),
        make_condition(
            "negative",
            "Negative",
            vec![make_criterion("crit2", "delayed", Operator::LessThan, 0.0)],
        ),
    ]);
    let mut engine = spawn_engine(def, provider);

    assert!(engine.current_output().is_blank());
    assert_eq!(engine.current_output().value.to_string(), "---");
    assert!(engine.current_output().active_condition.is_none());

    // First sample self-heals the indeterminate state
    engine.handle_sample(sample("delayed", 0.7, 8));
    let output = engine.current_output();
    assert_eq!(output.value, OutputValue::Value("Positive".to_string()));
    assert_eq!(output.active_condition.as_deref(), Some("positive"));
}

#[test]
fn test_false_dominates_indeterminate_within_all() {
    // One criterion definitely false, one with no data: the condition is
    // false, so the walk continues and settles on the default instead of
    // blanking.
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![make_condition(
        "both",
        "BOTH",
        vec![
            make_criterion("crit1", "live", Operator::GreaterThan, 0.0),
            make_criterion("crit2", "silent", Operator::GreaterThan, 0.0),
        ],
    )]);
    let mut engine = spawn_engine(def, provider);

    engine.handle_sample(sample("live", -1.0, 0));
    let output = engine.current_output();
    assert_eq!(output.active_condition.as_deref(), Some("dflt"));
}

#[test]
fn test_indeterminate_higher_priority_masks_true_lower() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![
        make_condition(
            "pending",
            "PENDING",
            vec![make_criterion("crit1", "silent", Operator::GreaterThan, 0.0)],
        ),
        make_condition(
            "ready",
            "READY",
            vec![make_criterion("crit2", "live", Operator::GreaterThan, 0.0)],
        ),
    ]);
    let mut engine = spawn_engine(def, provider);

    engine.handle_sample(sample("live", 5.0, 0));
    assert!(
        engine.current_output().is_blank(),
        "true lower-priority condition must not mask a pending unknown"
    );
}

#[test]
fn test_retain_option_holds_previous_output_through_indeterminate() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![make_condition(
        "positive",
        "Positive",
        vec![make_criterion("crit1", "gen", Operator::GreaterThanOrEqualTo, 0.0)],
    )]);
    let mut engine = ConditionSetEngine::new(
        def,
        provider,
        EngineOptions {
            retain_output_on_indeterminate: true,
        },
    )
    .unwrap();

    engine.handle_sample(sample("gen", 1.0, 0));
    assert_eq!(
        engine.current_output().value,
        OutputValue::Value("Positive".to_string())
    );

    // Source flags its next sample bad; evaluation goes indeterminate
    // but the previous output is retained.
    engine.handle_sample(sample("gen", 2.0, 1).invalid());
    assert_eq!(
        engine.current_output().value,
        OutputValue::Value("Positive".to_string())
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Priority and live editing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reordering_changes_the_winner_on_next_tick() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![
        make_condition(
            "warm",
            "WARM",
            vec![make_criterion("crit1", "temp", Operator::GreaterThan, 10.0)],
        ),
        make_condition(
            "hot",
            "HOT",
            vec![make_criterion("crit2", "temp", Operator::GreaterThan, 30.0)],
        ),
    ]);
    let mut engine = spawn_engine(def, provider);

    // Both conditions true; first in priority order wins.
    engine.handle_sample(sample("temp", 40.0, 0));
    assert_eq!(engine.current_output().active_condition.as_deref(), Some("warm"));

    engine
        .reorder_conditions(&[
            "hot".to_string(),
            "warm".to_string(),
            "dflt".to_string(),
        ])
        .unwrap();

    // Reorder re-evaluates immediately with the cached values.
    assert_eq!(engine.current_output().active_condition.as_deref(), Some("hot"));
    let changes = output_changes(engine.take_events());
    assert_eq!(
        changes.last().unwrap().value,
        OutputValue::Value("HOT".to_string())
    );
}

#[test]
fn test_reorder_rejects_incomplete_order() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![make_condition(
        "only",
        "ONLY",
        vec![make_criterion("crit1", "gen", Operator::GreaterThan, 0.0)],
    )]);
    let mut engine = spawn_engine(def, provider);

    assert!(engine.reorder_conditions(&["only".to_string()]).is_err());
    // Default not last is rejected structurally
    assert!(
        engine
            .reorder_conditions(&["dflt".to_string(), "only".to_string()])
            .is_err()
    );
}

#[test]
fn test_removing_active_condition_forces_reevaluation() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![
        make_condition(
            "first",
            "FIRST",
            vec![make_criterion("crit1", "gen", Operator::GreaterThan, 0.0)],
        ),
        make_condition(
            "second",
            "SECOND",
            vec![make_criterion("crit2", "gen", Operator::GreaterThan, 0.0)],
        ),
    ]);
    let mut engine = spawn_engine(def, provider);

    engine.handle_sample(sample("gen", 1.0, 0));
    assert_eq!(engine.current_output().active_condition.as_deref(), Some("first"));

    engine.remove_condition("first").unwrap();
    assert_eq!(engine.current_output().active_condition.as_deref(), Some("second"));

    engine.remove_condition("second").unwrap();
    assert_eq!(engine.current_output().active_condition.as_deref(), Some("dflt"));
}

#[test]
fn test_add_condition_lands_above_default() {
    let provider = Arc::new(CountingProvider::default());
    let mut engine = spawn_engine(make_set(vec![]), Arc::clone(&provider));

    engine.handle_sample(sample("gen", 1.0, 0));
    engine
        .add_condition(make_condition(
            "added",
            "ADDED",
            vec![make_criterion("crit1", "gen", Operator::GreaterThan, 0.0)],
        ))
        .unwrap();

    let def = engine.definition();
    assert_eq!(def.conditions.len(), 2);
    assert!(def.conditions[1].is_default);
    // Immediate re-evaluation picked the new condition up
    assert_eq!(engine.current_output().active_condition.as_deref(), Some("added"));
}

#[test]
fn test_update_criterion_self_heals_and_rewarns() {
    let provider = Arc::new(CountingProvider::default());
    let mut broken = make_criterion("crit1", "gen", Operator::LessThan, 0.0);
    broken.operand = Some(TelemetryValue::Text("fast".to_string()));
    let def = make_set(vec![make_condition("c1", "C1", vec![broken])]);
    let mut engine = spawn_engine(def, provider);

    engine.handle_sample(sample("gen", -1.0, 0));
    let warnings: Vec<_> = engine
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::ConfigurationWarning { .. }))
        .collect();
    assert_eq!(warnings.len(), 1, "warning reported once");

    // Same broken config, more samples: no repeat warning
    engine.handle_sample(sample("gen", -2.0, 1));
    assert!(
        engine
            .take_events()
            .iter()
            .all(|e| !matches!(e, EngineEvent::ConfigurationWarning { .. }))
    );

    // Fixing the operand brings the criterion back to life
    engine
        .update_criterion(
            "crit1",
            &CriterionPatch {
                operand: Some(TelemetryValue::Number(0.0)),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        engine.current_output().active_condition.as_deref(),
        Some("c1")
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_removing_criterion_releases_subscription_immediately() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![make_condition(
        "c1",
        "C1",
        vec![
            make_criterion("crit_a", "alpha", Operator::GreaterThan, 0.0),
            make_criterion("crit_b", "beta", Operator::GreaterThan, 0.0),
        ],
    )]);
    let mut engine = spawn_engine(def, Arc::clone(&provider));
    assert_eq!(provider.live_keys().len(), 2);

    engine.remove_criterion("crit_b").unwrap();

    let live = provider.live_keys();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].source, "alpha");

    // A straggler sample for the released stream is cached but does not
    // drive evaluation.
    engine.handle_sample(sample("alpha", 1.0, 0));
    assert_eq!(engine.current_output().active_condition.as_deref(), Some("c1"));
    let before = engine.current_output().clone();
    engine.handle_sample(sample("beta", -1.0, 1));
    assert_eq!(*engine.current_output(), before);
}

#[test]
fn test_shared_stream_survives_partial_criterion_removal() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![
        make_condition(
            "pos",
            "POS",
            vec![make_criterion("crit1", "shared", Operator::GreaterThanOrEqualTo, 0.0)],
        ),
        make_condition(
            "neg",
            "NEG",
            vec![make_criterion("crit2", "shared", Operator::LessThan, 0.0)],
        ),
    ]);
    let mut engine = spawn_engine(def, Arc::clone(&provider));
    assert_eq!(provider.live_keys().len(), 1);

    // Another criterion still references the stream: keep the feed.
    engine.remove_criterion("crit1").unwrap();
    assert_eq!(provider.live_keys().len(), 1);

    engine.remove_criterion("crit2").unwrap();
    assert!(provider.live_keys().is_empty());
}

#[test]
fn test_destroying_engine_releases_all_subscriptions() {
    let provider = Arc::new(CountingProvider::default());
    let def = make_set(vec![make_condition(
        "c1",
        "C1",
        vec![
            make_criterion("crit_a", "alpha", Operator::GreaterThan, 0.0),
            make_criterion("crit_b", "beta", Operator::GreaterThan, 0.0),
        ],
    )]);
    let engine = spawn_engine(def, Arc::clone(&provider));
    assert_eq!(provider.live_keys().len(), 2);

    drop(engine);
    assert!(provider.live_keys().is_empty());
}

#[test]
fn test_subscription_failure_reports_unavailable_not_blank() {
    let provider = Arc::new(CountingProvider::failing(&["broken"]));
    let def = make_set(vec![make_condition(
        "c1",
        "C1",
        vec![make_criterion("crit1", "broken", Operator::GreaterThan, 0.0)],
    )]);
    let mut engine = spawn_engine(def, Arc::clone(&provider));

    assert_eq!(engine.current_output().value, OutputValue::Unavailable);
    let failures: Vec<_> = engine
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::SubscriptionFailed { .. }))
        .collect();
    assert_eq!(failures.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Round-trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_round_trip_reproduces_evaluation_sequence() {
    let def = make_set(vec![
        make_condition(
            "positive",
            "Positive",
            vec![make_criterion("crit1", "gen", Operator::GreaterThanOrEqualTo, 0.0)],
        ),
        make_condition(
            "negative",
            "Negative",
            vec![make_criterion("crit2", "gen", Operator::LessThan, 0.0)],
        ),
    ]);

    let json = serde_json::to_string(&def).unwrap();
    let reloaded: ConditionSetDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(def, reloaded);

    let samples = [
        sample("gen", 0.5, 0),
        sample("gen", -0.5, 1),
        sample("gen", -0.1, 2),
        sample("gen", 0.0, 3),
    ];

    let run = |definition: ConditionSetDefinition| -> Vec<OutputState> {
        let provider = Arc::new(CountingProvider::default());
        let mut engine = spawn_engine(definition, provider);
        let mut outputs = Vec::new();
        for s in &samples {
            engine.handle_sample(s.clone());
            outputs.push(engine.current_output().clone());
        }
        outputs.extend(output_changes(engine.take_events()));
        outputs
    };

    assert_eq!(run(def), run(reloaded));
}
