use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One observation of a named metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A snapshot of host-process runtime counters, collected at a specific
/// point in time for monitoring purposes.
///
/// Memory figures are bytes; `gc_pause_ms` is cumulative collector pause in
/// milliseconds as reported by the optional embedder probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub heap_alloc: u64,
    pub heap_sys: u64,
    pub heap_idle: u64,
    pub heap_inuse: u64,
    pub heap_released: u64,
    pub heap_objects: u64,
    pub task_count: u64,
    pub gc_pause_ms: f64,
    pub gc_num: u64,
    pub gc_cpu_fraction: f64,
    pub timestamp: DateTime<Utc>,
}

/// Current HTTP performance statistics exported by the request probe.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HttpStats {
    pub request_count: i64,
    pub error_count: i64,
    /// Errors / requests, as a percentage.
    pub error_rate: f64,
    /// Requests per second since the probe started.
    pub request_rate: f64,
    /// Milliseconds.
    pub avg_response_time: f64,
    /// Milliseconds.
    pub max_response_time: f64,
    pub pending_requests: i64,
}

/// The closed set of side-effect kinds a rule body can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Alert,
    Log,
    Dashboard,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Alert => write!(f, "alert"),
            ActionKind::Log => write!(f, "log"),
            ActionKind::Dashboard => write!(f, "dashboard"),
        }
    }
}

/// A side-effect requested by a triggered rule, dispatched through the
/// action registry to every handler registered for its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub message: String,
    pub rule: String,
    pub timestamp: DateTime<Utc>,
    pub data: Option<serde_json::Value>,
}

impl Action {
    pub fn new(kind: ActionKind, message: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            rule: rule.into(),
            timestamp: Utc::now(),
            data: None,
        }
    }
}

/// An action processor. Multiple handlers may be registered for the same
/// kind; a handler error aborts the remaining handlers for that dispatch.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, action: &Action) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    /// Derive a severity from the alert message text by keyword match.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("critical") || lower.contains("leak") {
            AlertSeverity::Critical
        } else if lower.contains("high") || lower.contains("warning") {
            AlertSeverity::High
        } else if lower.contains("info") {
            AlertSeverity::Low
        } else {
            AlertSeverity::Medium
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Suppressed => write!(f, "suppressed"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            "suppressed" => Ok(AlertStatus::Suppressed),
            _ => Err(format!("unknown status: {s}")),
        }
    }
}

/// A durable record created by an `alert` action, mutated in place through
/// the lifecycle state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    pub notes: Vec<AlertNote>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Append-only annotation on an alert. A missing author is tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNote {
    pub id: String,
    pub message: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// One dashboard-facing metric snapshot frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricUpdate {
    pub timestamp: DateTime<Utc>,
    pub metrics: HashMap<String, f64>,
}

impl Default for MetricUpdate {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            metrics: HashMap::new(),
        }
    }
}

/// One dashboard-facing event frame (alerts, logs, rule triggers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventUpdate {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl EventUpdate {
    pub fn new(
        event_type: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type: event_type.into(),
            message: message.into(),
            rule: rule.into(),
            data,
        }
    }
}

/// Rule metadata exposed to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInfo {
    pub name: String,
    pub source: String,
    pub last_trigger: Option<DateTime<Utc>>,
}
