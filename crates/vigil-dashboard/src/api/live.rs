use crate::api::ok;
use crate::state::DashboardState;
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;
use vigil_common::types::MetricUpdate;

/// `GET /api/metrics` — the most recent metric snapshot.
pub async fn current_metrics(
    State(state): State<Arc<DashboardState>>,
) -> Json<serde_json::Value> {
    let latest = state
        .latest_metrics
        .read()
        .unwrap()
        .clone()
        .unwrap_or_default();
    ok(latest)
}

/// `GET /api/events` — chronological copy of the live circular buffer.
pub async fn recent_events(State(state): State<Arc<DashboardState>>) -> Json<serde_json::Value> {
    let events = state.events.lock().unwrap().in_order();
    ok(events)
}

pub(crate) fn current_snapshot(state: &DashboardState) -> MetricUpdate {
    state
        .latest_metrics
        .read()
        .unwrap()
        .clone()
        .unwrap_or_default()
}
