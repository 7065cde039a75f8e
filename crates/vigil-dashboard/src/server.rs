use crate::alert_store::AlertStore;
use crate::state::{DashboardConfig, DashboardState, RulesPort};
use crate::{api, broadcast};
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use vigil_common::types::{EventUpdate, MetricUpdate};

type Receivers = (mpsc::Receiver<MetricUpdate>, mpsc::Receiver<EventUpdate>);

/// The dashboard HTTP/WebSocket server.
///
/// Metric and event frames are enqueued with [`send_metric_update`] and
/// [`send_event_update`]; a full channel drops the frame rather than
/// blocking the producer.
///
/// [`send_metric_update`]: DashboardServer::send_metric_update
/// [`send_event_update`]: DashboardServer::send_event_update
pub struct DashboardServer {
    state: Arc<DashboardState>,
    receivers: Mutex<Option<Receivers>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig) -> Self {
        let (metric_tx, metric_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (stop_tx, _) = watch::channel(false);

        let state = Arc::new(DashboardState::new(config, metric_tx, event_tx, stop_tx));

        Self {
            state,
            receivers: Mutex::new(Some((metric_rx, event_rx))),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> Arc<DashboardState> {
        Arc::clone(&self.state)
    }

    pub fn alert_store(&self) -> Arc<AlertStore> {
        Arc::clone(&self.state.alerts)
    }

    pub fn set_rules_port(&self, port: Arc<dyn RulesPort>) {
        *self.state.rules_port.write().unwrap() = Some(port);
    }

    /// Sender half of the event channel, for action handlers that forward
    /// events directly.
    pub fn event_sender(&self) -> mpsc::Sender<EventUpdate> {
        self.state.event_tx.clone()
    }

    /// Chronological copy of the live event buffer.
    pub fn recent_events(&self) -> Vec<EventUpdate> {
        self.state.events.lock().unwrap().in_order()
    }

    /// Enqueue a metric snapshot for broadcast; dropped if the channel is
    /// full.
    pub fn send_metric_update(&self, metrics: HashMap<String, f64>) {
        let _ = self.state.metric_tx.try_send(MetricUpdate {
            timestamp: chrono::Utc::now(),
            metrics,
        });
    }

    /// Enqueue an event for broadcast; dropped if the channel is full.
    pub fn send_event_update(
        &self,
        event_type: &str,
        message: &str,
        rule: &str,
        data: Option<serde_json::Value>,
    ) {
        let _ = self
            .state
            .event_tx
            .try_send(EventUpdate::new(event_type, message, rule, data));
    }

    /// The axum router, exposed for tests and embedders that mount the
    /// dashboard under their own server.
    pub fn router(&self) -> Router {
        api::build_router(Arc::clone(&self.state))
    }

    /// Start the broadcast task and bind the HTTP listener. Idempotent.
    pub async fn start(&self) -> anyhow::Result<()> {
        let Some((metric_rx, event_rx)) = self.receivers.lock().unwrap().take() else {
            return Ok(());
        };

        let broadcast_task = tokio::spawn(broadcast::run(
            Arc::clone(&self.state),
            metric_rx,
            event_rx,
            self.state.stop_rx(),
        ));

        let addr: SocketAddr = ([0, 0, 0, 0], self.state.config.port).into();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "dashboard listening");

        let router = self.router();
        let mut stop_rx = self.state.stop_rx();
        let serve_task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop_rx.changed().await;
            };
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(%error, "dashboard server error");
            }
        });

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(broadcast_task);
        tasks.push(serve_task);
        Ok(())
    }

    /// Signal shutdown: interrupts playback, closes WebSocket clients and
    /// stops the listener. Idempotent.
    pub fn stop(&self) {
        let _ = self.state.stop_tx.send(true);
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

impl Drop for DashboardServer {
    fn drop(&mut self) {
        self.stop();
    }
}
