use chrono::Utc;
use std::sync::{Arc, RwLock};
use vigil_common::id;
use vigil_common::types::{
    Action, ActionHandler, ActionKind, Alert, AlertNote, AlertSeverity, AlertStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum AlertStoreError {
    #[error("alert not found: {0}")]
    NotFound(String),
    #[error("invalid alert transition: {from} -> {to}")]
    InvalidTransition { from: AlertStatus, to: AlertStatus },
}

/// In-memory alert list with in-place status transitions.
///
/// Allowed transitions: `active` to acknowledged/resolved/suppressed,
/// `acknowledged` to resolved/suppressed, `suppressed` back to active or on
/// to resolved. `resolved` is terminal and `resolved_at` is set exactly once.
pub struct AlertStore {
    alerts: RwLock<Vec<Alert>>,
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
        }
    }

    /// Create an `active` alert; severity is derived from the message text.
    pub fn create(
        &self,
        rule: &str,
        message: &str,
        data: Option<serde_json::Value>,
    ) -> Alert {
        let now = Utc::now();
        let mut metadata = std::collections::HashMap::new();
        if let Some(data) = data {
            metadata.insert("trigger_data".to_string(), data);
        }
        let alert = Alert {
            id: id::next_id(),
            rule: rule.to_string(),
            message: message.to_string(),
            severity: AlertSeverity::from_message(message),
            status: AlertStatus::Active,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            acknowledged_by: None,
            notes: Vec::new(),
            metadata,
        };
        self.alerts.write().unwrap().push(alert.clone());
        alert
    }

    /// Filtered copy, newest first. Sorting happens on the copy, outside the
    /// lock.
    pub fn list(
        &self,
        status: Option<AlertStatus>,
        severity: Option<AlertSeverity>,
    ) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = {
            let alerts = self.alerts.read().unwrap();
            alerts
                .iter()
                .filter(|a| status.is_none_or(|s| a.status == s))
                .filter(|a| severity.is_none_or(|s| a.severity == s))
                .cloned()
                .collect()
        };
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts
    }

    pub fn get(&self, id: &str) -> Option<Alert> {
        self.alerts
            .read()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.alerts.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.read().unwrap().is_empty()
    }

    pub fn acknowledge(
        &self,
        id: &str,
        user: Option<&str>,
        note: Option<&str>,
    ) -> Result<(), AlertStoreError> {
        self.transition(id, AlertStatus::Acknowledged, user, note)
    }

    pub fn resolve(
        &self,
        id: &str,
        user: Option<&str>,
        note: Option<&str>,
    ) -> Result<(), AlertStoreError> {
        self.transition(id, AlertStatus::Resolved, user, note)
    }

    pub fn suppress(
        &self,
        id: &str,
        user: Option<&str>,
        note: Option<&str>,
    ) -> Result<(), AlertStoreError> {
        self.transition(id, AlertStatus::Suppressed, user, note)
    }

    /// Re-open a suppressed alert.
    pub fn reactivate(&self, id: &str, user: Option<&str>) -> Result<(), AlertStoreError> {
        self.transition(id, AlertStatus::Active, user, None)
    }

    fn transition(
        &self,
        id: &str,
        to: AlertStatus,
        user: Option<&str>,
        note: Option<&str>,
    ) -> Result<(), AlertStoreError> {
        let mut alerts = self.alerts.write().unwrap();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AlertStoreError::NotFound(id.to_string()))?;

        if !transition_allowed(alert.status, to) {
            return Err(AlertStoreError::InvalidTransition {
                from: alert.status,
                to,
            });
        }

        let now = Utc::now();
        alert.status = to;
        alert.updated_at = now;

        match to {
            AlertStatus::Acknowledged => {
                if let Some(user) = user.filter(|u| !u.is_empty()) {
                    alert.acknowledged_by = Some(user.to_string());
                }
            }
            AlertStatus::Resolved => {
                if alert.resolved_at.is_none() {
                    alert.resolved_at = Some(now);
                }
            }
            _ => {}
        }

        if let Some(note) = note.filter(|n| !n.is_empty()) {
            alert.notes.push(AlertNote {
                id: id::next_id(),
                message: note.to_string(),
                author: user.unwrap_or_default().to_string(),
                created_at: now,
            });
        }

        Ok(())
    }

    /// Append a note without changing status. A missing author is tolerated.
    pub fn add_note(
        &self,
        id: &str,
        message: &str,
        author: Option<&str>,
    ) -> Result<(), AlertStoreError> {
        let mut alerts = self.alerts.write().unwrap();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AlertStoreError::NotFound(id.to_string()))?;

        let now = Utc::now();
        alert.notes.push(AlertNote {
            id: id::next_id(),
            message: message.to_string(),
            author: author.unwrap_or_default().to_string(),
            created_at: now,
        });
        alert.updated_at = now;
        Ok(())
    }
}

fn transition_allowed(from: AlertStatus, to: AlertStatus) -> bool {
    use AlertStatus::*;
    matches!(
        (from, to),
        (Active, Acknowledged)
            | (Active, Resolved)
            | (Active, Suppressed)
            | (Acknowledged, Resolved)
            | (Acknowledged, Suppressed)
            | (Suppressed, Active)
            | (Suppressed, Resolved)
    )
}

/// Registered for the `alert` action kind: every alert action becomes an
/// alert record.
pub struct AlertIngestHandler {
    store: Arc<AlertStore>,
}

impl AlertIngestHandler {
    pub fn new(store: Arc<AlertStore>) -> Self {
        Self { store }
    }
}

impl ActionHandler for AlertIngestHandler {
    fn handle(&self, action: &Action) -> anyhow::Result<()> {
        if action.kind == ActionKind::Alert {
            self.store
                .create(&action.rule, &action.message, action.data.clone());
        }
        Ok(())
    }
}
