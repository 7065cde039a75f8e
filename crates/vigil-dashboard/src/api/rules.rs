use crate::api::{bad_request, live, ok};
use crate::state::DashboardState;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 100;
const MAX_CODE_LEN: usize = 5000;

/// `GET /api/rules` — rules known to the engine, via the rules port.
pub async fn list_rules(State(state): State<Arc<DashboardState>>) -> Json<serde_json::Value> {
    ok(state.rules())
}

#[derive(Debug, Deserialize)]
pub struct RuleRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
}

fn check_bounds(req: &RuleRequest) -> Option<Response> {
    if req.name.is_empty() {
        return Some(bad_request("Rule name is required"));
    }
    if req.name.len() > MAX_NAME_LEN {
        return Some(bad_request(
            "Rule name exceeds maximum length of 100 characters",
        ));
    }
    if req.code.len() > MAX_CODE_LEN {
        return Some(bad_request(
            "Rule code exceeds maximum length of 5000 characters",
        ));
    }
    None
}

/// Conservative structural check: non-empty, contains `when`, and the braces
/// balance.
fn structural_errors(code: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if code.is_empty() {
        errors.push("Rule code cannot be empty".to_string());
        return errors;
    }
    if !code.to_lowercase().contains("when") || !code.contains('{') {
        errors.push("Rule must contain 'when' condition and action block".to_string());
    }
    if errors.is_empty() && !braces_balanced(code) {
        errors.push("Unbalanced braces in rule code".to_string());
    }
    errors
}

fn braces_balanced(code: &str) -> bool {
    let mut depth: i64 = 0;
    for ch in code.chars() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// `POST /api/rules/validate {name, code}`
pub async fn validate_rule(Json(req): Json<RuleRequest>) -> Response {
    if let Some(resp) = check_bounds(&req) {
        return resp;
    }

    let errors = structural_errors(&req.code);
    let body = if errors.is_empty() {
        json!({ "valid": true, "message": "Rule syntax is valid" })
    } else {
        json!({ "valid": false, "errors": errors })
    };
    Json(body).into_response()
}

/// `POST /api/rules/save {name, code}` — admit the rule through the engine's
/// rules port.
pub async fn save_rule(
    State(state): State<Arc<DashboardState>>,
    Json(req): Json<RuleRequest>,
) -> Response {
    if let Some(resp) = check_bounds(&req) {
        return resp;
    }
    if let Some(error) = structural_errors(&req.code).into_iter().next() {
        return bad_request(&error);
    }

    let port = state.rules_port.read().unwrap().clone();
    let Some(port) = port else {
        return bad_request("Rule storage is not available");
    };

    match port.save(&req.name, &req.code) {
        Ok(()) => Json(json!({
            "status": "ok",
            "message": format!("Rule '{}' saved successfully", req.name),
        }))
        .into_response(),
        Err(err) => bad_request(&err),
    }
}

/// `POST /api/rules/test {name, code}` — best-effort evaluation of the first
/// recognizable threshold comparison against the current snapshot.
pub async fn test_rule(
    State(state): State<Arc<DashboardState>>,
    Json(req): Json<RuleRequest>,
) -> Response {
    if let Some(resp) = check_bounds(&req) {
        return resp;
    }

    let snapshot = live::current_snapshot(&state);
    let (would_trigger, result) = match extract_comparison(&req.code) {
        Some((metric, op, threshold)) => match snapshot.metrics.get(&metric) {
            Some(value) => {
                let fired = match op {
                    Comparison::Gt => *value > threshold,
                    Comparison::Gte => *value >= threshold,
                    Comparison::Lt => *value < threshold,
                    Comparison::Lte => *value <= threshold,
                };
                if fired {
                    (true, "Rule would TRIGGER with current metrics".to_string())
                } else {
                    (false, "Rule would not trigger with current metrics".to_string())
                }
            }
            None => (
                false,
                format!("Metric '{metric}' has no current value"),
            ),
        },
        None => (
            false,
            "No recognizable threshold condition to test".to_string(),
        ),
    };

    Json(json!({
        "status": "ok",
        "wouldTrigger": would_trigger,
        "result": result,
        "metrics": snapshot.metrics,
    }))
    .into_response()
}

enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Scan the rule text for the first `<metric> <op> <number><unit?>` triple.
fn extract_comparison(code: &str) -> Option<(String, Comparison, f64)> {
    let tokens: Vec<&str> = code
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '{' || c == '}')
        .filter(|t| !t.is_empty())
        .collect();

    for window in tokens.windows(3) {
        let op = match window[1] {
            ">" => Comparison::Gt,
            ">=" => Comparison::Gte,
            "<" => Comparison::Lt,
            "<=" => Comparison::Lte,
            _ => continue,
        };
        if !window[0].contains('.') {
            continue;
        }
        if let Some(threshold) = parse_threshold(window[2]) {
            return Some((window[0].to_string(), op, threshold));
        }
    }
    None
}

fn parse_threshold(raw: &str) -> Option<f64> {
    let (digits, factor) = if let Some(stripped) = raw.strip_suffix("GB") {
        (stripped, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(stripped) = raw.strip_suffix("MB") {
        (stripped, 1024.0 * 1024.0)
    } else if let Some(stripped) = raw.strip_suffix("ms") {
        (stripped, 1.0)
    } else if let Some(stripped) = raw.strip_suffix('s') {
        (stripped, 1000.0)
    } else {
        (raw, 1.0)
    };
    digits.parse::<f64>().ok().map(|v| v * factor)
}
