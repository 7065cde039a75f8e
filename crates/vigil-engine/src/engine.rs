use crate::actions::{ActionRegistry, ConsoleAlertHandler, DashboardForwarder, LogHandler};
use crate::config::EngineConfig;
use crate::error::AdmitError;
use crate::eval::{Evaluator, Value};
use crate::tracker::ResourceTracker;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use vigil_common::types::{ActionHandler, ActionKind, RuleInfo};
use vigil_dashboard::{AlertIngestHandler, DashboardServer, RulesPort};
use vigil_dsl::Program;
use vigil_metrics::names;
use vigil_metrics::{HttpProbe, MetricReader, MetricStore, RuntimeCollector, StoreError};

/// Granularity of the per-evaluation resource supervisor.
const SUPERVISOR_TICK: Duration = Duration::from_millis(10);

/// Rule file extension recognized by [`Engine::load_rules_dir`].
const RULE_FILE_EXT: &str = "dscr";

struct Rule {
    name: String,
    source: String,
    program: Arc<Program>,
    last_trigger: Option<DateTime<Utc>>,
}

/// The monitoring engine. Owns metric collection, the rule registry, the
/// evaluation loop, action dispatch and the dashboard server.
///
/// Constructors return `Arc<Engine>` because the engine hands narrow
/// capabilities on itself to the dashboard.
pub struct Engine {
    config: EngineConfig,
    store: Arc<MetricStore>,
    collector: Arc<RuntimeCollector>,
    probe: Arc<HttpProbe>,
    registry: Arc<ActionRegistry>,
    evaluator: Evaluator,
    dashboard: Arc<DashboardServer>,
    rules: RwLock<Vec<Rule>>,
    limit_diagnostics: RwLock<HashMap<String, String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Engine {
    pub fn new() -> Arc<Self> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Arc<Self> {
        let limits = &config.limits;
        let store = Arc::new(MetricStore::new(
            limits.max_metric_history,
            limits.max_custom_metrics,
        ));
        let collector = Arc::new(RuntimeCollector::new(
            Arc::clone(&store),
            config.collector_interval(),
            limits.max_metric_history,
        ));
        let probe = Arc::new(HttpProbe::with_store(1000, Arc::clone(&store)));
        let dashboard = Arc::new(DashboardServer::new(config.dashboard.clone()));

        let registry = Arc::new(ActionRegistry::new());
        registry.register(ActionKind::Alert, Arc::new(ConsoleAlertHandler));
        registry.register(ActionKind::Log, Arc::new(LogHandler));
        let forwarder: Arc<dyn ActionHandler> =
            Arc::new(DashboardForwarder::new(dashboard.event_sender()));
        registry.register(ActionKind::Alert, Arc::clone(&forwarder));
        registry.register(ActionKind::Log, forwarder);
        registry.register(
            ActionKind::Alert,
            Arc::new(AlertIngestHandler::new(dashboard.alert_store())),
        );

        let evaluator = Evaluator::new(
            Arc::clone(&store) as Arc<dyn MetricReader>,
            Arc::clone(&registry),
        );

        let engine = Arc::new(Self {
            config,
            store,
            collector,
            probe,
            registry,
            evaluator,
            dashboard,
            rules: RwLock::new(Vec::new()),
            limit_diagnostics: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        });

        engine
            .dashboard
            .set_rules_port(Arc::clone(&engine) as Arc<dyn RulesPort>);

        engine
    }

    /// Begin monitoring: the runtime collector, the dashboard server and
    /// the rule evaluation loop. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        self.collector.start();

        let dashboard = Arc::clone(&self.dashboard);
        let dashboard_task = tokio::spawn(async move {
            if let Err(error) = dashboard.start().await {
                tracing::error!(%error, "dashboard failed to start");
            }
        });

        let engine = Arc::clone(self);
        let loop_task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(engine.config.evaluation_interval());
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await;
            loop {
                tick.tick().await;
                engine.evaluate_rules_once().await;
                engine.publish_snapshot();
            }
        });

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(dashboard_task);
        tasks.push(loop_task);
    }

    /// Halt the evaluation loop, the collector and the dashboard.
    /// Idempotent; the engine can be started again afterwards.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        self.collector.stop();
        self.dashboard.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Parse and admit a rule. Admission checks run in order: rule count,
    /// name uniqueness, parse, complexity. A failing rule changes nothing.
    pub fn add_rule(&self, name: &str, source: &str) -> Result<(), AdmitError> {
        let mut rules = self.rules.write().unwrap();

        if rules.len() >= self.config.limits.max_rules {
            return Err(AdmitError::TooManyRules {
                limit: self.config.limits.max_rules,
            });
        }
        if rules.iter().any(|r| r.name == name) {
            return Err(AdmitError::DuplicateName(name.to_string()));
        }

        let program = vigil_dsl::parse(source).map_err(AdmitError::Parse)?;

        let nodes = program.count_nodes();
        if nodes > self.config.limits.max_rule_complexity {
            return Err(AdmitError::Complexity {
                nodes,
                limit: self.config.limits.max_rule_complexity,
            });
        }

        rules.push(Rule {
            name: name.to_string(),
            source: source.to_string(),
            program: Arc::new(program),
            last_trigger: None,
        });
        Ok(())
    }

    /// Admit the contents of one `.dscr` file; the rule name defaults to
    /// the file stem.
    pub fn add_rule_file(&self, path: impl AsRef<Path>) -> Result<(), AdmitError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.add_rule(&name, &source)
    }

    /// Admit every `.dscr` file in a directory. Admission failures are
    /// logged per file and do not abort the remaining files; returns the
    /// number of rules loaded.
    pub fn load_rules_dir(&self, dir: impl AsRef<Path>) -> Result<usize, AdmitError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RULE_FILE_EXT) {
                continue;
            }
            match self.add_rule_file(&path) {
                Ok(()) => loaded += 1,
                Err(error) => {
                    tracing::warn!(file = %path.display(), %error, "skipping rule file");
                }
            }
        }
        Ok(loaded)
    }

    /// Atomically drop every loaded rule.
    pub fn clear_rules(&self) {
        self.rules.write().unwrap().clear();
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        self.rules
            .read()
            .unwrap()
            .iter()
            .map(|r| RuleInfo {
                name: r.name.clone(),
                source: r.source.clone(),
                last_trigger: r.last_trigger,
            })
            .collect()
    }

    /// Register or update a user-defined metric, subject to the
    /// custom-metric cap.
    pub fn update_custom_metric(&self, name: &str, value: f64) -> Result<(), StoreError> {
        self.store.update_custom(name, value)
    }

    pub fn custom_metric(&self, name: &str) -> Option<f64> {
        self.store.get(name)
    }

    pub fn metrics(&self) -> Arc<MetricStore> {
        Arc::clone(&self.store)
    }

    pub fn collector(&self) -> Arc<RuntimeCollector> {
        Arc::clone(&self.collector)
    }

    /// The request probe; wire it into an axum router with
    /// `axum::middleware::from_fn_with_state(engine.http_probe(), HttpProbe::track)`.
    pub fn http_probe(&self) -> Arc<HttpProbe> {
        Arc::clone(&self.probe)
    }

    pub fn actions(&self) -> Arc<ActionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn dashboard(&self) -> Arc<DashboardServer> {
        Arc::clone(&self.dashboard)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Limit-exceeded diagnostics keyed by rule name, most recent per rule.
    pub fn limit_diagnostics(&self) -> HashMap<String, String> {
        self.limit_diagnostics.read().unwrap().clone()
    }

    /// Evaluate every loaded rule once. The evaluation loop calls this each
    /// tick; tests may call it directly.
    pub async fn evaluate_rules_once(&self) {
        let snapshot: Vec<(String, Arc<Program>)> = {
            let rules = self.rules.read().unwrap();
            rules
                .iter()
                .map(|r| (r.name.clone(), Arc::clone(&r.program)))
                .collect()
        };

        for (name, program) in snapshot {
            self.evaluate_rule(&name, program).await;
        }
    }

    /// Supervisory harness around one rule evaluation: a blocking task with
    /// panic capture, a 10 ms resource supervisor and a wall-clock timeout.
    async fn evaluate_rule(&self, name: &str, program: Arc<Program>) {
        let limits = &self.config.limits;
        let tracker = ResourceTracker::new(
            limits.max_memory_bytes,
            limits.max_cpu_time(),
            limits.max_evaluation_time(),
        );
        let cancel = tracker.cancel_flag();

        let evaluator = self.evaluator.clone();
        let rule_name = name.to_string();
        let mut eval_task =
            tokio::task::spawn_blocking(move || evaluator.eval(&program, &rule_name, &cancel));

        let mut supervisor = tokio::time::interval(SUPERVISOR_TICK);
        supervisor.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let timeout = tokio::time::sleep(limits.max_evaluation_time());
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                joined = &mut eval_task => {
                    match joined {
                        Ok(Ok(Value::Triggered)) => self.record_trigger(name, &tracker),
                        Ok(Ok(_)) => {}
                        Ok(Err(error)) => {
                            let mem = tracker.memory_stats();
                            let cpu = tracker.cpu_stats();
                            tracing::error!(
                                rule = %name,
                                %error,
                                memory_budget_pct = mem.budget_used,
                                cpu_time = ?cpu.cpu_time_used,
                                "rule evaluation error"
                            );
                        }
                        Err(join_error) => {
                            if join_error.is_panic() {
                                tracing::error!(rule = %name, "panic during rule evaluation");
                            } else {
                                tracing::error!(rule = %name, "rule evaluation task cancelled");
                            }
                        }
                    }
                    return;
                }
                _ = supervisor.tick() => {
                    if let Err(limit) = tracker.check_limits() {
                        tracker.cancel();
                        self.limit_diagnostics
                            .write()
                            .unwrap()
                            .insert(name.to_string(), limit.to_string());
                        let mem = tracker.memory_stats();
                        let cpu = tracker.cpu_stats();
                        tracing::warn!(
                            rule = %name,
                            resource = limit.resource(),
                            %limit,
                            memory_budget_pct = mem.budget_used,
                            cpu_time = ?cpu.cpu_time_used,
                            "rule evaluation resource limit exceeded"
                        );
                        return;
                    }
                }
                _ = &mut timeout => {
                    tracker.cancel();
                    self.limit_diagnostics
                        .write()
                        .unwrap()
                        .insert(name.to_string(), "evaluation timeout".to_string());
                    tracing::warn!(rule = %name, "rule evaluation timeout");
                    return;
                }
            }
        }
    }

    fn record_trigger(&self, name: &str, tracker: &ResourceTracker) {
        {
            let mut rules = self.rules.write().unwrap();
            if let Some(rule) = rules.iter_mut().find(|r| r.name == name) {
                rule.last_trigger = Some(Utc::now());
            }
        }

        self.dashboard
            .send_event_update("rule_triggered", "Rule condition met", name, None);

        let mem = tracker.memory_stats();
        let cpu = tracker.cpu_stats();
        tracing::info!(
            rule = %name,
            memory_budget_pct = mem.budget_used,
            cpu_time = ?cpu.cpu_time_used,
            cpu_efficiency_pct = cpu.cpu_efficiency,
            "rule triggered"
        );
    }

    /// Compose the current runtime and HTTP figures into one dashboard
    /// snapshot frame.
    fn publish_snapshot(&self) {
        let mut metrics: HashMap<String, f64> = HashMap::new();

        if let Some(snap) = self.collector.current() {
            metrics.insert(names::HEAP_ALLOC.into(), snap.heap_alloc as f64);
            metrics.insert(names::HEAP_SYS.into(), snap.heap_sys as f64);
            metrics.insert(names::HEAP_IDLE.into(), snap.heap_idle as f64);
            metrics.insert(names::HEAP_INUSE.into(), snap.heap_inuse as f64);
            metrics.insert(names::HEAP_RELEASED.into(), snap.heap_released as f64);
            metrics.insert(names::HEAP_OBJECTS.into(), snap.heap_objects as f64);
            metrics.insert(names::TASKS_COUNT.into(), snap.task_count as f64);
            metrics.insert(names::GC_PAUSE.into(), snap.gc_pause_ms);
            metrics.insert(names::GC_NUM.into(), snap.gc_num as f64);
            metrics.insert(names::GC_CPU_FRACTION.into(), snap.gc_cpu_fraction);
        }

        let http = self.probe.stats();
        metrics.insert(names::HTTP_REQUEST_COUNT.into(), http.request_count as f64);
        metrics.insert(names::HTTP_ERROR_COUNT.into(), http.error_count as f64);
        metrics.insert(names::HTTP_ERROR_RATE.into(), http.error_rate);
        metrics.insert(names::HTTP_REQUEST_RATE.into(), http.request_rate);
        metrics.insert(names::HTTP_RESPONSE_TIME.into(), http.avg_response_time);
        metrics.insert(
            names::HTTP_MAX_RESPONSE_TIME.into(),
            http.max_response_time,
        );
        metrics.insert(
            names::HTTP_PENDING_REQUESTS.into(),
            http.pending_requests as f64,
        );

        self.dashboard.send_metric_update(metrics);
    }
}

impl RulesPort for Engine {
    fn list(&self) -> Vec<RuleInfo> {
        self.rules()
    }

    fn save(&self, name: &str, code: &str) -> Result<(), String> {
        self.add_rule(name, code).map_err(|e| e.to_string())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
