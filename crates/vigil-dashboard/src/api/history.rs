use crate::api::{bad_request, ok};
use crate::playback::{self, PlaybackRequest};
use crate::state::DashboardState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct TimeRangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_bound(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, Response> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<DateTime<Utc>>()
            .map(Some)
            .map_err(|_| bad_request(&format!("Invalid '{field}' time format"))),
    }
}

/// `GET /api/history/metrics?from=ISO8601&to=ISO8601`
pub async fn historical_metrics(
    State(state): State<Arc<DashboardState>>,
    Query(params): Query<TimeRangeParams>,
) -> Response {
    let from = match parse_bound(params.from.as_deref(), "from") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let to = match parse_bound(params.to.as_deref(), "to") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let filtered: Vec<_> = {
        let history = state.historical_metrics.read().unwrap();
        history
            .iter()
            .filter(|m| from.is_none_or(|f| m.timestamp >= f))
            .filter(|m| to.is_none_or(|t| m.timestamp <= t))
            .cloned()
            .collect()
    };
    ok(filtered).into_response()
}

/// `GET /api/history/events?from=ISO8601&to=ISO8601`
pub async fn historical_events(
    State(state): State<Arc<DashboardState>>,
    Query(params): Query<TimeRangeParams>,
) -> Response {
    let from = match parse_bound(params.from.as_deref(), "from") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let to = match parse_bound(params.to.as_deref(), "to") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let filtered: Vec<_> = {
        let history = state.historical_events.read().unwrap();
        history
            .iter()
            .filter(|e| from.is_none_or(|f| e.timestamp >= f))
            .filter(|e| to.is_none_or(|t| e.timestamp <= t))
            .cloned()
            .collect()
    };
    ok(filtered).into_response()
}

/// `POST /api/playback {from, to, speed, interval}` — start a replay task.
pub async fn start_playback(
    State(state): State<Arc<DashboardState>>,
    Json(mut req): Json<PlaybackRequest>,
) -> Response {
    if req.speed <= 0.0 {
        req.speed = 1.0;
    }
    if req.interval == 0 {
        req.interval = 1000;
    }

    let from: DateTime<Utc> = match req.from.parse() {
        Ok(v) => v,
        Err(_) => return bad_request("Invalid 'from' time format"),
    };
    let to: DateTime<Utc> = match req.to.parse() {
        Ok(v) => v,
        Err(_) => return bad_request("Invalid 'to' time format"),
    };

    playback::spawn(
        Arc::clone(&state),
        from,
        to,
        req.speed,
        Duration::from_millis(req.interval),
    );

    Json(json!({
        "status": "ok",
        "message": "Playback started",
    }))
    .into_response()
}
