use crate::state::DashboardState;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackRequest {
    pub from: String,
    pub to: String,
    /// Playback speed multiplier; 1.0 is real-time pacing of `interval`.
    #[serde(default)]
    pub speed: f64,
    /// Milliseconds between emitted frames before the speed divisor.
    #[serde(default)]
    pub interval: u64,
}

enum Item {
    Metric(serde_json::Value),
    Event(serde_json::Value),
}

/// Start a replay of the historical buffers over `[from, to]` as a detached
/// task. Frames are emitted oldest-first at `interval / speed` pacing and the
/// replay ends with a `playback_complete` frame. Server shutdown interrupts
/// the replay.
pub fn spawn(state: Arc<DashboardState>, from: DateTime<Utc>, to: DateTime<Utc>, speed: f64, interval: Duration) {
    tokio::spawn(run(state, from, to, speed, interval));
}

async fn run(
    state: Arc<DashboardState>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    speed: f64,
    interval: Duration,
) {
    let mut items: Vec<(DateTime<Utc>, Item)> = Vec::new();

    {
        let metrics = state.historical_metrics.read().unwrap();
        for update in metrics.iter() {
            if update.timestamp >= from && update.timestamp <= to {
                items.push((
                    update.timestamp,
                    Item::Metric(serde_json::to_value(update).unwrap_or_default()),
                ));
            }
        }
    }
    {
        let events = state.historical_events.read().unwrap();
        for event in events.iter() {
            if event.timestamp >= from && event.timestamp <= to {
                items.push((
                    event.timestamp,
                    Item::Event(serde_json::to_value(event).unwrap_or_default()),
                ));
            }
        }
    }

    // Stable: metrics come before events at equal timestamps.
    items.sort_by_key(|(ts, _)| *ts);

    let pace = interval.div_f64(speed.max(f64::MIN_POSITIVE));
    let mut stop_rx = state.stop_rx();

    for (_, item) in items {
        if *stop_rx.borrow_and_update() {
            return;
        }

        let frame = match item {
            Item::Metric(data) => json!({
                "type": "playback_metric",
                "data": data,
                "playback": true,
            }),
            Item::Event(data) => json!({
                "type": "playback_event",
                "data": data,
                "playback": true,
            }),
        };
        state.broadcast(&frame);

        tokio::select! {
            _ = tokio::time::sleep(pace) => {}
            _ = stop_rx.changed() => return,
        }
    }

    state.broadcast(&json!({
        "type": "playback_complete",
        "playback": true,
    }));
}
