use crate::state::DashboardState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationRequest {
    pub metric_x: String,
    pub metric_y: String,
    /// Minutes of history to consider.
    #[serde(default)]
    pub time_range: i64,
    /// Maximum number of (x, y) pairs, most recent kept.
    #[serde(default)]
    pub window_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationResult {
    pub metric_x: String,
    pub metric_y: String,
    pub coefficient: f64,
    pub strength: String,
    pub data_points: usize,
    pub scatter_data: Vec<ScatterPoint>,
    pub anomalies: Vec<AnomalyPoint>,
    pub time_range: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnomalyPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
    pub anomaly_type: &'static str,
    pub severity: f64,
}

/// Window used for the local-correlation anomaly scan.
const ANOMALY_WINDOW: usize = 10;
/// Absolute deviation from the global coefficient that flags an anomaly.
const ANOMALY_DEVIATION: f64 = 0.3;

pub fn analyze(state: &DashboardState, mut req: CorrelationRequest) -> CorrelationResult {
    if req.time_range <= 0 {
        req.time_range = 60;
    }
    if req.window_size == 0 {
        req.window_size = 100;
    }

    let cutoff = Utc::now() - chrono::Duration::minutes(req.time_range);

    let mut points: Vec<ScatterPoint> = {
        let history = state.historical_metrics.read().unwrap();
        history
            .iter()
            .filter(|update| update.timestamp >= cutoff)
            .filter_map(|update| {
                let x = update.metrics.get(&req.metric_x)?;
                let y = update.metrics.get(&req.metric_y)?;
                Some(ScatterPoint {
                    x: *x,
                    y: *y,
                    timestamp: update.timestamp,
                })
            })
            .collect()
    };

    if points.len() > req.window_size {
        points.drain(..points.len() - req.window_size);
    }

    let coefficient = pearson(&points);
    let anomalies = detect_anomalies(&points, coefficient);

    CorrelationResult {
        metric_x: req.metric_x,
        metric_y: req.metric_y,
        coefficient,
        strength: strength(coefficient).to_string(),
        data_points: points.len(),
        scatter_data: points,
        anomalies,
        time_range: format!("{} minutes", req.time_range),
    }
}

/// Pearson's r; 0 when there are fewer than two points or either series is
/// constant.
pub fn pearson(points: &[ScatterPoint]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for p in points {
        sum_x += p.x;
        sum_y += p.y;
    }
    let mean_x = sum_x / n as f64;
    let mean_y = sum_y / n as f64;

    let mut numerator = 0.0;
    let mut sum_x_sq = 0.0;
    let mut sum_y_sq = 0.0;
    for p in points {
        let dx = p.x - mean_x;
        let dy = p.y - mean_y;
        numerator += dx * dy;
        sum_x_sq += dx * dx;
        sum_y_sq += dy * dy;
    }

    let denominator = sum_x_sq * sum_y_sq;
    if denominator <= 0.0 {
        return 0.0;
    }

    numerator / denominator.sqrt()
}

pub fn strength(coefficient: f64) -> &'static str {
    match coefficient.abs() {
        c if c >= 0.9 => "Very Strong",
        c if c >= 0.7 => "Strong",
        c if c >= 0.5 => "Moderate",
        c if c >= 0.3 => "Weak",
        _ => "Very Weak",
    }
}

/// Slide a fixed-size window over the series; where the local correlation
/// deviates from the global one by more than the threshold, flag the window's
/// right edge.
fn detect_anomalies(points: &[ScatterPoint], global: f64) -> Vec<AnomalyPoint> {
    if points.len() < ANOMALY_WINDOW {
        return Vec::new();
    }

    let mut anomalies = Vec::new();
    for i in ANOMALY_WINDOW..points.len() {
        let local = pearson(&points[i - ANOMALY_WINDOW..i]);
        let deviation = local - global;
        if deviation.abs() > ANOMALY_DEVIATION {
            anomalies.push(AnomalyPoint {
                x: points[i].x,
                y: points[i].y,
                timestamp: points[i].timestamp,
                anomaly_type: if deviation > 0.0 {
                    "stronger_correlation"
                } else {
                    "weaker_correlation"
                },
                severity: deviation.abs(),
            });
        }
    }
    anomalies
}
