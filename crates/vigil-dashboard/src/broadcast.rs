use crate::state::DashboardState;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use vigil_common::types::{EventUpdate, MetricUpdate};

/// Single consumer of the incoming metric/event channels.
///
/// Each frame is appended to the appropriate buffers under a write lock and
/// then fanned out to the connected clients outside the lock.
pub(crate) async fn run(
    state: Arc<DashboardState>,
    mut metric_rx: mpsc::Receiver<MetricUpdate>,
    mut event_rx: mpsc::Receiver<EventUpdate>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            update = metric_rx.recv() => {
                let Some(update) = update else { return };
                store_metric(&state, update.clone());
                state.broadcast(&json!({
                    "type": "metrics",
                    "data": update,
                }));
            }
            event = event_rx.recv() => {
                let Some(event) = event else { return };
                store_event(&state, event.clone());
                state.broadcast(&json!({
                    "type": "event",
                    "data": event,
                }));
            }
            _ = stop_rx.changed() => return,
        }
    }
}

fn store_metric(state: &DashboardState, update: MetricUpdate) {
    *state.latest_metrics.write().unwrap() = Some(update.clone());

    let mut history = state.historical_metrics.write().unwrap();
    history.push_back(update);
    while history.len() > state.config.history_capacity {
        history.pop_front();
    }
}

fn store_event(state: &DashboardState, event: EventUpdate) {
    state.events.lock().unwrap().push(event.clone());

    let mut history = state.historical_events.write().unwrap();
    history.push_back(event);
    while history.len() > state.config.history_capacity {
        history.pop_front();
    }
}
