use crate::actions::ActionRegistry;
use crate::config::{EngineConfig, ResourceLimits};
use crate::engine::Engine;
use crate::error::{AdmitError, EvalError};
use crate::eval::{Evaluator, Value};
use crate::tracker::{CancelFlag, ResourceTracker};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vigil_common::types::{Action, ActionHandler, ActionKind};
use vigil_metrics::MetricReader;

/// Canned metric reader that records aggregation calls.
struct StubMetrics {
    values: HashMap<String, f64>,
    windows: Mutex<Vec<(String, Duration)>>,
}

impl StubMetrics {
    fn new(values: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            windows: Mutex::new(Vec::new()),
        })
    }
}

impl MetricReader for StubMetrics {
    fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    fn avg(&self, name: &str, window: Duration) -> f64 {
        self.windows
            .lock()
            .unwrap()
            .push((name.to_string(), window));
        42.0
    }

    fn max(&self, name: &str, window: Duration) -> f64 {
        self.windows
            .lock()
            .unwrap()
            .push((name.to_string(), window));
        99.0
    }

    fn trend(&self, name: &str, window: Duration) -> f64 {
        self.windows
            .lock()
            .unwrap()
            .push((name.to_string(), window));
        -1.0
    }
}

#[derive(Default)]
struct CaptureHandler {
    actions: Mutex<Vec<Action>>,
}

impl ActionHandler for CaptureHandler {
    fn handle(&self, action: &Action) -> anyhow::Result<()> {
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }
}

struct FailingHandler;

impl ActionHandler for FailingHandler {
    fn handle(&self, _action: &Action) -> anyhow::Result<()> {
        anyhow::bail!("handler exploded")
    }
}

fn evaluator_with(
    metrics: Arc<StubMetrics>,
) -> (Evaluator, Arc<CaptureHandler>, Arc<ActionRegistry>) {
    let registry = Arc::new(ActionRegistry::new());
    let capture = Arc::new(CaptureHandler::default());
    registry.register(ActionKind::Alert, Arc::clone(&capture) as Arc<dyn ActionHandler>);
    registry.register(ActionKind::Log, Arc::clone(&capture) as Arc<dyn ActionHandler>);
    let evaluator = Evaluator::new(metrics, Arc::clone(&registry));
    (evaluator, capture, registry)
}

fn eval_source(source: &str) -> Result<Value, EvalError> {
    let (evaluator, _capture, _registry) = evaluator_with(StubMetrics::new(&[]));
    let program = vigil_dsl::parse(source).expect("parse");
    evaluator.eval(&program, "test", &CancelFlag::default())
}

// ---- Evaluator ----

#[test]
fn integer_arithmetic_and_comparison() {
    assert_eq!(eval_source("1 + 2 * 3").unwrap(), Value::Integer(7));
    assert_eq!(eval_source("10 - 4 / 2").unwrap(), Value::Integer(8));
    assert_eq!(eval_source("5 > 3").unwrap(), Value::Boolean(true));
    assert_eq!(eval_source("5 <= 4").unwrap(), Value::Boolean(false));
    assert_eq!(eval_source("5 == 5").unwrap(), Value::Boolean(true));
}

#[test]
fn integer_division_by_zero_is_an_error() {
    assert_eq!(eval_source("1 / 0").unwrap_err(), EvalError::DivisionByZero);
}

#[test]
fn float_operands_widen() {
    assert_eq!(eval_source("1 + 2.5").unwrap(), Value::Float(3.5));
    assert_eq!(eval_source("2.5 * 2").unwrap(), Value::Float(5.0));
    assert_eq!(eval_source("1.5 < 2").unwrap(), Value::Boolean(true));
    assert_eq!(
        eval_source("1.0 / 0").unwrap_err(),
        EvalError::DivisionByZero
    );
}

#[test]
fn boolean_logic() {
    assert_eq!(eval_source("(1 < 2) && (3 < 4)").unwrap(), Value::Boolean(true));
    assert_eq!(eval_source("(1 > 2) || (3 < 4)").unwrap(), Value::Boolean(true));
    assert_eq!(eval_source("!(1 > 2)").unwrap(), Value::Boolean(true));
}

#[test]
fn boolean_logic_short_circuits() {
    // The right side would divide by zero; short-circuit skips it.
    assert_eq!(
        eval_source("(1 > 2) && (1 / 0 > 0)").unwrap(),
        Value::Boolean(false)
    );
    assert_eq!(
        eval_source("(1 < 2) || (1 / 0 > 0)").unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn string_equality_and_type_mismatch() {
    assert_eq!(
        eval_source(r#""abc" == "abc""#).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        eval_source(r#""abc" != "xyz""#).unwrap(),
        Value::Boolean(true)
    );
    assert!(matches!(
        eval_source(r#""abc" && "xyz""#).unwrap_err(),
        EvalError::UnknownOperator { .. }
    ));
}

#[test]
fn unit_expressions_scale_literals() {
    assert_eq!(eval_source("200MB").unwrap(), Value::Integer(200 * 1024 * 1024));
    assert_eq!(eval_source("1GB").unwrap(), Value::Integer(1024 * 1024 * 1024));
    assert_eq!(eval_source("2s").unwrap(), Value::Integer(2000));
    assert_eq!(eval_source("5m").unwrap(), Value::Integer(300_000));
    assert_eq!(eval_source("1.5s").unwrap(), Value::Float(1500.0));
}

#[test]
fn dot_expression_reads_builtin_metrics() {
    let metrics = StubMetrics::new(&[("heap.alloc", 123.0), ("gc.pause", 1.5)]);
    let (evaluator, _, _) = evaluator_with(metrics);

    let program = vigil_dsl::parse("heap.alloc").unwrap();
    assert_eq!(
        evaluator.eval(&program, "r", &CancelFlag::default()).unwrap(),
        Value::Integer(123)
    );

    let program = vigil_dsl::parse("gc.pause").unwrap();
    assert_eq!(
        evaluator.eval(&program, "r", &CancelFlag::default()).unwrap(),
        Value::Float(1.5)
    );
}

#[test]
fn dot_expression_unknown_pair_is_an_error() {
    assert!(matches!(
        eval_source("heap.bogus").unwrap_err(),
        EvalError::UnknownMetric { .. }
    ));
    assert!(matches!(
        eval_source("nope.alloc").unwrap_err(),
        EvalError::UnknownMetric { .. }
    ));
}

#[test]
fn builtin_metric_without_samples_reads_zero() {
    // goroutines.count is a known name; no sample recorded yet.
    assert_eq!(eval_source("goroutines.count").unwrap(), Value::Integer(0));
}

#[test]
fn bare_identifier_is_an_error() {
    assert!(matches!(
        eval_source("heap").unwrap_err(),
        EvalError::IdentifierNotFound(name) if name == "heap"
    ));
}

#[test]
fn when_statement_triggers_and_dispatches_actions() {
    let (evaluator, capture, _) = evaluator_with(StubMetrics::new(&[]));
    let program = vigil_dsl::parse(r#"when 1 < 2 { log("hit") }"#).unwrap();
    let result = evaluator
        .eval(&program, "my_rule", &CancelFlag::default())
        .unwrap();
    assert_eq!(result, Value::Triggered);

    let actions = capture.actions.lock().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].kind, ActionKind::Log);
    assert_eq!(actions[0].message, "hit");
    assert_eq!(actions[0].rule, "my_rule");
}

#[test]
fn when_statement_yields_null_when_guard_fails() {
    let (evaluator, capture, _) = evaluator_with(StubMetrics::new(&[]));
    let program = vigil_dsl::parse(r#"when 2 < 1 { alert("never") }"#).unwrap();
    let result = evaluator
        .eval(&program, "quiet", &CancelFlag::default())
        .unwrap();
    assert_eq!(result, Value::Null);
    assert!(capture.actions.lock().unwrap().is_empty());
}

#[test]
fn guard_error_propagates_and_skips_the_body() {
    let (evaluator, capture, _) = evaluator_with(StubMetrics::new(&[]));
    let program = vigil_dsl::parse(r#"when 1 / 0 > 0 { alert("x") }"#).unwrap();
    let err = evaluator
        .eval(&program, "bad", &CancelFlag::default())
        .unwrap_err();
    assert_eq!(err, EvalError::DivisionByZero);
    assert!(capture.actions.lock().unwrap().is_empty());
}

#[test]
fn aggregation_accepts_unit_durations() {
    let metrics = StubMetrics::new(&[]);
    let (evaluator, _, _) = evaluator_with(Arc::clone(&metrics));

    let program = vigil_dsl::parse(r#"avg("heap.alloc", 5m)"#).unwrap();
    assert_eq!(
        evaluator.eval(&program, "r", &CancelFlag::default()).unwrap(),
        Value::Float(42.0)
    );

    let windows = metrics.windows.lock().unwrap();
    assert_eq!(windows[0], ("heap.alloc".to_string(), Duration::from_secs(300)));
}

#[test]
fn aggregation_accepts_bare_seconds() {
    let metrics = StubMetrics::new(&[]);
    let (evaluator, _, _) = evaluator_with(Arc::clone(&metrics));

    let program = vigil_dsl::parse(r#"max("http.response_time", 60)"#).unwrap();
    assert_eq!(
        evaluator.eval(&program, "r", &CancelFlag::default()).unwrap(),
        Value::Float(99.0)
    );

    let windows = metrics.windows.lock().unwrap();
    assert_eq!(
        windows[0],
        ("http.response_time".to_string(), Duration::from_secs(60))
    );
}

#[test]
fn aggregation_rejects_malformed_paths_and_arguments() {
    assert!(matches!(
        eval_source(r#"avg("heapalloc", 60)"#).unwrap_err(),
        EvalError::BadMetricPath(_)
    ));
    assert!(matches!(
        eval_source(r#"avg("a.b.c", 60)"#).unwrap_err(),
        EvalError::BadMetricPath(_)
    ));
    assert!(matches!(
        eval_source("avg(5, 60)").unwrap_err(),
        EvalError::BadArgument { .. }
    ));
    assert!(matches!(
        eval_source(r#"avg("a.b")"#).unwrap_err(),
        EvalError::WrongArgCount { .. }
    ));
    assert!(matches!(
        eval_source(r#"trend("a.b", "soon")"#).unwrap_err(),
        EvalError::BadArgument { .. }
    ));
}

#[test]
fn unknown_function_is_an_error() {
    assert!(matches!(
        eval_source(r#"frobnicate("x")"#).unwrap_err(),
        EvalError::UnknownFunction(name) if name == "frobnicate"
    ));
}

#[test]
fn action_wrong_arity_is_an_error() {
    assert!(matches!(
        eval_source("alert()").unwrap_err(),
        EvalError::WrongArgCount { function: "alert", got: 0, want: 1 }
    ));
    assert!(matches!(
        eval_source(r#"log("a", "b")"#).unwrap_err(),
        EvalError::WrongArgCount { function: "log", got: 2, want: 1 }
    ));
}

#[test]
fn handler_failure_surfaces_as_evaluation_error() {
    let registry = Arc::new(ActionRegistry::new());
    let capture = Arc::new(CaptureHandler::default());
    registry.register(ActionKind::Alert, Arc::new(FailingHandler));
    registry.register(ActionKind::Alert, Arc::clone(&capture) as Arc<dyn ActionHandler>);
    let evaluator = Evaluator::new(StubMetrics::new(&[]), registry);

    let program = vigil_dsl::parse(r#"alert("x")"#).unwrap();
    let err = evaluator
        .eval(&program, "r", &CancelFlag::default())
        .unwrap_err();
    assert!(matches!(err, EvalError::ActionFailed { .. }));
    // The failing handler aborted the rest of the dispatch.
    assert!(capture.actions.lock().unwrap().is_empty());
}

#[test]
fn cancelled_evaluation_reports_cancelled() {
    let (evaluator, _, _) = evaluator_with(StubMetrics::new(&[]));
    let cancel = CancelFlag::default();
    cancel.cancel();
    let program = vigil_dsl::parse("1 + 1").unwrap();
    assert_eq!(
        evaluator.eval(&program, "r", &cancel).unwrap_err(),
        EvalError::Cancelled
    );
}

// ---- Action registry ----

#[test]
fn dispatch_without_handlers_is_an_error() {
    let registry = ActionRegistry::new();
    let action = Action::new(ActionKind::Dashboard, "m", "r");
    assert!(registry.dispatch(&action).is_err());
}

#[test]
fn handlers_run_in_registration_order() {
    let registry = ActionRegistry::new();
    let first = Arc::new(CaptureHandler::default());
    let second = Arc::new(CaptureHandler::default());
    registry.register(ActionKind::Log, Arc::clone(&first) as Arc<dyn ActionHandler>);
    registry.register(ActionKind::Log, Arc::clone(&second) as Arc<dyn ActionHandler>);

    registry
        .dispatch(&Action::new(ActionKind::Log, "m", "r"))
        .unwrap();
    assert_eq!(first.actions.lock().unwrap().len(), 1);
    assert_eq!(second.actions.lock().unwrap().len(), 1);
}

// ---- Resource tracker ----

#[test]
fn tracker_within_budget_passes() {
    let tracker = ResourceTracker::new(
        u64::MAX / 2,
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );
    assert!(tracker.check_limits().is_ok());
}

#[test]
fn tracker_reports_cancellation() {
    let tracker = ResourceTracker::new(
        u64::MAX / 2,
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );
    tracker.cancel();
    assert!(tracker.check_limits().is_err());
}

#[test]
fn tracker_expired_deadline_reads_as_cancelled() {
    let tracker =
        ResourceTracker::new(u64::MAX / 2, Duration::from_secs(3600), Duration::ZERO);
    std::thread::sleep(Duration::from_millis(2));
    assert!(tracker.cancel_flag().is_cancelled());
    assert!(tracker.check_limits().is_err());
}

#[test]
fn tracker_cpu_budget_violation_cancels() {
    let tracker =
        ResourceTracker::new(u64::MAX / 2, Duration::ZERO, Duration::from_secs(3600));
    // Burn a little CPU so the zero budget is measurably exceeded.
    let mut acc = 0u64;
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_millis(20) {
        acc = acc.wrapping_add(1);
    }
    assert!(acc > 0);
    assert!(tracker.check_limits().is_err());
    assert!(tracker.cancel_flag().is_cancelled());
}

#[test]
fn tracker_stats_are_consistent() {
    let tracker = ResourceTracker::new(
        64 * 1024 * 1024,
        Duration::from_millis(100),
        Duration::from_secs(1),
    );
    let mem = tracker.memory_stats();
    assert!(mem.max_allowed >= mem.initial_alloc);
    assert!(mem.budget_used >= 0.0);

    let cpu = tracker.cpu_stats();
    assert_eq!(cpu.max_cpu_time, Duration::from_millis(100));
    assert!(cpu.wall_time_used >= Duration::ZERO);
}

// ---- Engine admission ----

fn small_engine(max_rules: usize, max_complexity: usize) -> Arc<Engine> {
    let config = EngineConfig {
        limits: ResourceLimits {
            max_rules,
            max_rule_complexity: max_complexity,
            ..ResourceLimits::default()
        },
        ..EngineConfig::default()
    };
    Engine::with_config(config)
}

#[test]
fn add_rule_enforces_the_rule_count_limit() {
    let engine = small_engine(2, 1000);
    engine.add_rule("a", r#"when 1 < 2 { log("a") }"#).unwrap();
    engine.add_rule("b", r#"when 1 < 2 { log("b") }"#).unwrap();
    let err = engine
        .add_rule("c", r#"when 1 < 2 { log("c") }"#)
        .unwrap_err();
    assert!(matches!(err, AdmitError::TooManyRules { limit: 2 }));
    assert_eq!(engine.rules().len(), 2);
}

#[test]
fn add_rule_rejects_duplicate_names() {
    let engine = small_engine(10, 1000);
    engine.add_rule("dup", r#"when 1 < 2 { log("a") }"#).unwrap();
    assert!(matches!(
        engine.add_rule("dup", r#"when 1 < 2 { log("b") }"#),
        Err(AdmitError::DuplicateName(_))
    ));
}

#[test]
fn parse_failure_admits_nothing() {
    let engine = small_engine(10, 1000);
    let before = engine.rules();
    let err = engine.add_rule("broken", "when > {").unwrap_err();
    assert!(matches!(err, AdmitError::Parse(_)));
    assert_eq!(engine.rules().len(), before.len());
}

#[test]
fn complexity_limit_rejects_large_rules() {
    let engine = small_engine(10, 5);
    let err = engine
        .add_rule(
            "big",
            r#"when heap.alloc > 100MB && goroutines.count > 10 { alert("x") }"#,
        )
        .unwrap_err();
    assert!(err.to_string().contains("complexity"));
    assert!(engine.rules().is_empty());
}

#[test]
fn clear_rules_empties_the_registry() {
    let engine = small_engine(10, 1000);
    engine.add_rule("a", r#"when 1 < 2 { log("a") }"#).unwrap();
    engine.clear_rules();
    assert!(engine.rules().is_empty());
}

#[test]
fn custom_metrics_respect_the_cap_through_the_engine() {
    let config = EngineConfig {
        limits: ResourceLimits {
            max_custom_metrics: 2,
            ..ResourceLimits::default()
        },
        ..EngineConfig::default()
    };
    let engine = Engine::with_config(config);
    engine.update_custom_metric("orders.pending", 5.0).unwrap();
    engine.update_custom_metric("orders.failed", 1.0).unwrap();
    assert!(engine.update_custom_metric("orders.total", 6.0).is_err());
    engine.update_custom_metric("orders.pending", 7.0).unwrap();
    assert_eq!(engine.custom_metric("orders.pending"), Some(7.0));
}

#[test]
fn config_defaults_match_documented_limits() {
    let config = EngineConfig::default();
    assert_eq!(config.evaluation_interval(), Duration::from_secs(1));
    assert_eq!(config.collector_interval(), Duration::from_millis(100));
    assert_eq!(config.limits.max_rules, 100);
    assert_eq!(config.limits.max_rule_complexity, 1000);
    assert_eq!(config.limits.max_memory_bytes, 100 * 1024 * 1024);
    assert_eq!(config.limits.max_cpu_time(), Duration::from_millis(100));
    assert_eq!(config.limits.max_evaluation_time(), Duration::from_secs(1));
    assert_eq!(config.limits.max_custom_metrics, 1000);
}

#[test]
fn config_parses_partial_toml() {
    let config: EngineConfig = toml::from_str(
        r#"
        evaluation_interval_ms = 250

        [limits]
        max_rules = 7

        [dashboard]
        port = 0
        "#,
    )
    .unwrap();
    assert_eq!(config.evaluation_interval_ms, 250);
    assert_eq!(config.limits.max_rules, 7);
    assert_eq!(config.limits.max_rule_complexity, 1000);
    assert_eq!(config.dashboard.port, 0);
}
