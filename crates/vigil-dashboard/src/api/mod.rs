pub mod alerts;
pub mod history;
pub mod live;
pub mod rules;

use crate::correlation::{self, CorrelationRequest};
use crate::state::DashboardState;
use crate::ws;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// The `{"status":"ok","data":...}` response envelope.
pub(crate) fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "data": data }))
}

pub(crate) fn bad_request(message: &str) -> Response {
    (axum::http::StatusCode::BAD_REQUEST, message.to_string()).into_response()
}

pub(crate) fn not_found(message: &str) -> Response {
    (axum::http::StatusCode::NOT_FOUND, message.to_string()).into_response()
}

pub fn build_router(state: Arc<DashboardState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/api/metrics", get(live::current_metrics))
        .route("/api/events", get(live::recent_events))
        .route("/api/rules", get(rules::list_rules))
        .route("/api/rules/validate", post(rules::validate_rule))
        .route("/api/rules/save", post(rules::save_rule))
        .route("/api/rules/test", post(rules::test_rule))
        .route("/api/history/metrics", get(history::historical_metrics))
        .route("/api/history/events", get(history::historical_events))
        .route("/api/playback", post(history::start_playback))
        .route("/api/alerts", get(alerts::list_alerts))
        .route("/api/alerts/acknowledge", post(alerts::acknowledge_alert))
        .route("/api/alerts/resolve", post(alerts::resolve_alert))
        .route("/api/alerts/suppress", post(alerts::suppress_alert))
        .route("/api/alerts/note", post(alerts::add_alert_note))
        .route(
            "/api/correlation",
            get(correlation_metrics).post(analyze_correlation),
        )
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(axum::middleware::from_fn(crate::logging::request_logging))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Metric names offered for quick correlation analysis.
async fn correlation_metrics() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "metrics": vigil_metrics::names::HEADLINE,
    }))
}

async fn analyze_correlation(
    State(state): State<Arc<DashboardState>>,
    Json(req): Json<CorrelationRequest>,
) -> Json<serde_json::Value> {
    let result = correlation::analyze(&state, req);
    ok(result)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Vigil Dashboard</title>
    <style>
        body { font-family: sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }
        .header { background: #2c3e50; color: white; padding: 20px; border-radius: 5px; }
        .card { background: white; padding: 20px; border-radius: 5px; margin-top: 20px;
                box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        pre { background: #ecf0f1; padding: 10px; border-radius: 3px; overflow-x: auto; }
        code { font-family: monospace; }
    </style>
</head>
<body>
    <div class="header">
        <h1>Vigil Dashboard</h1>
        <p>Runtime monitoring and rule engine</p>
    </div>
    <div class="card">
        <h3>Live metrics</h3>
        <pre id="metrics">waiting for data...</pre>
    </div>
    <div class="card">
        <h3>Recent events</h3>
        <pre id="events"></pre>
    </div>
    <div class="card">
        <h3>API</h3>
        <p><code>GET /api/metrics</code> · <code>GET /api/events</code> ·
           <code>GET /api/rules</code> · <code>GET /api/alerts</code> ·
           <code>POST /api/correlation</code> · <code>POST /api/playback</code> ·
           WebSocket at <code>/ws</code></p>
    </div>
    <script>
        const ws = new WebSocket('ws://' + location.host + '/ws');
        const events = [];
        ws.onmessage = (msg) => {
            const frame = JSON.parse(msg.data);
            if (frame.type === 'metrics') {
                document.getElementById('metrics').textContent =
                    JSON.stringify(frame.data.metrics, null, 2);
            } else if (frame.type === 'event') {
                events.unshift(frame.data.timestamp + ' [' + frame.data.type + '] ' +
                    (frame.data.rule ? frame.data.rule + ': ' : '') + frame.data.message);
                if (events.length > 20) events.pop();
                document.getElementById('events').textContent = events.join('\n');
            }
        };
    </script>
</body>
</html>
"#;
