use crate::alert_store::AlertStoreError;
use crate::api::{bad_request, not_found, ok};
use crate::state::DashboardState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use vigil_common::types::{AlertSeverity, AlertStatus};

const MAX_NOTE_LEN: usize = 1000;
const MAX_USER_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct AlertFilterParams {
    pub status: Option<String>,
    pub severity: Option<String>,
}

/// `GET /api/alerts?status=&severity=` — filtered, newest first.
pub async fn list_alerts(
    State(state): State<Arc<DashboardState>>,
    Query(params): Query<AlertFilterParams>,
) -> Response {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<AlertStatus>() {
            Ok(status) => Some(status),
            Err(_) => return bad_request("Invalid status filter"),
        },
    };
    let severity = match params.severity.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<AlertSeverity>() {
            Ok(severity) => Some(severity),
            Err(_) => return bad_request("Invalid severity filter"),
        },
    };

    ok(state.alerts.list(status, severity)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AlertActionRequest {
    pub alert_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub note: String,
}

fn validate(req: &AlertActionRequest) -> Option<Response> {
    if req.alert_id.is_empty() {
        return Some(bad_request("Alert ID is required"));
    }
    if req.note.len() > MAX_NOTE_LEN {
        return Some(bad_request("Note exceeds maximum length of 1000 characters"));
    }
    if req.user.len() > MAX_USER_LEN {
        return Some(bad_request(
            "User name exceeds maximum length of 100 characters",
        ));
    }
    None
}

fn transition_response(result: Result<(), AlertStoreError>, message: &str) -> Response {
    match result {
        Ok(()) => Json(json!({ "status": "ok", "message": message })).into_response(),
        Err(AlertStoreError::NotFound(_)) => not_found("Alert not found"),
        Err(err @ AlertStoreError::InvalidTransition { .. }) => bad_request(&err.to_string()),
    }
}

/// `POST /api/alerts/acknowledge {alert_id, user?, note?}`
pub async fn acknowledge_alert(
    State(state): State<Arc<DashboardState>>,
    Json(req): Json<AlertActionRequest>,
) -> Response {
    if let Some(resp) = validate(&req) {
        return resp;
    }
    transition_response(
        state.alerts.acknowledge(
            &req.alert_id,
            some_nonempty(&req.user),
            some_nonempty(&req.note),
        ),
        "Alert acknowledged successfully",
    )
}

/// `POST /api/alerts/resolve {alert_id, user?, note?}`
pub async fn resolve_alert(
    State(state): State<Arc<DashboardState>>,
    Json(req): Json<AlertActionRequest>,
) -> Response {
    if let Some(resp) = validate(&req) {
        return resp;
    }
    transition_response(
        state.alerts.resolve(
            &req.alert_id,
            some_nonempty(&req.user),
            some_nonempty(&req.note),
        ),
        "Alert resolved successfully",
    )
}

/// `POST /api/alerts/suppress {alert_id, user?, note?}`
pub async fn suppress_alert(
    State(state): State<Arc<DashboardState>>,
    Json(req): Json<AlertActionRequest>,
) -> Response {
    if let Some(resp) = validate(&req) {
        return resp;
    }
    transition_response(
        state.alerts.suppress(
            &req.alert_id,
            some_nonempty(&req.user),
            some_nonempty(&req.note),
        ),
        "Alert suppressed successfully",
    )
}

/// `POST /api/alerts/note {alert_id, user?, note}`
pub async fn add_alert_note(
    State(state): State<Arc<DashboardState>>,
    Json(req): Json<AlertActionRequest>,
) -> Response {
    if req.note.is_empty() {
        return bad_request("Note message is required");
    }
    if let Some(resp) = validate(&req) {
        return resp;
    }
    match state
        .alerts
        .add_note(&req.alert_id, &req.note, some_nonempty(&req.user))
    {
        Ok(()) => Json(json!({ "status": "ok", "message": "Note added successfully" }))
            .into_response(),
        Err(_) => not_found("Alert not found"),
    }
}

fn some_nonempty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
