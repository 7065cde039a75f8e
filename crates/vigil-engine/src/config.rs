use serde::Deserialize;
use std::time::Duration;
use vigil_dashboard::DashboardConfig;

/// Engine configuration, loadable from TOML or built programmatically.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Milliseconds between evaluation-loop ticks.
    #[serde(default = "default_evaluation_interval_ms")]
    pub evaluation_interval_ms: u64,
    /// Milliseconds between runtime-collector samples.
    #[serde(default = "default_collector_interval_ms")]
    pub collector_interval_ms: u64,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_ms: default_evaluation_interval_ms(),
            collector_interval_ms: default_collector_interval_ms(),
            dashboard: DashboardConfig::default(),
            limits: ResourceLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms.max(1))
    }

    pub fn collector_interval(&self) -> Duration {
        Duration::from_millis(self.collector_interval_ms.max(1))
    }
}

/// Resource limits enforced at admission and per evaluation.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceLimits {
    #[serde(default = "default_max_rules")]
    pub max_rules: usize,
    /// Maximum AST nodes per rule.
    #[serde(default = "default_max_rule_complexity")]
    pub max_rule_complexity: usize,
    /// Memory budget per evaluation, bytes above the baseline allocation.
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,
    /// CPU-time budget per evaluation, milliseconds.
    #[serde(default = "default_max_cpu_time_ms")]
    pub max_cpu_time_ms: u64,
    /// Wall-clock budget per evaluation, milliseconds.
    #[serde(default = "default_max_evaluation_time_ms")]
    pub max_evaluation_time_ms: u64,
    /// Samples retained per metric, and runtime snapshots retained by the
    /// collector.
    #[serde(default = "default_max_metric_history")]
    pub max_metric_history: usize,
    #[serde(default = "default_max_custom_metrics")]
    pub max_custom_metrics: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_rules: default_max_rules(),
            max_rule_complexity: default_max_rule_complexity(),
            max_memory_bytes: default_max_memory_bytes(),
            max_cpu_time_ms: default_max_cpu_time_ms(),
            max_evaluation_time_ms: default_max_evaluation_time_ms(),
            max_metric_history: default_max_metric_history(),
            max_custom_metrics: default_max_custom_metrics(),
        }
    }
}

impl ResourceLimits {
    pub fn max_cpu_time(&self) -> Duration {
        Duration::from_millis(self.max_cpu_time_ms)
    }

    pub fn max_evaluation_time(&self) -> Duration {
        Duration::from_millis(self.max_evaluation_time_ms)
    }
}

fn default_evaluation_interval_ms() -> u64 {
    1000
}

fn default_collector_interval_ms() -> u64 {
    100
}

fn default_max_rules() -> usize {
    100
}

fn default_max_rule_complexity() -> usize {
    1000
}

fn default_max_memory_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_max_cpu_time_ms() -> u64 {
    100
}

fn default_max_evaluation_time_ms() -> u64 {
    1000
}

fn default_max_metric_history() -> usize {
    10_000
}

fn default_max_custom_metrics() -> usize {
    1000
}
