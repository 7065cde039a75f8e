use crate::alert_store::AlertStore;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use vigil_common::types::{EventUpdate, MetricUpdate, RuleInfo};

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on concurrent WebSocket clients.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Size of the live-tab circular event buffer.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Capacity of the historical metric/event rings used for replay and
    /// correlation.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Capacity of the incoming metric/event channels; frames are dropped
    /// when a channel is full.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_clients: default_max_clients(),
            event_buffer: default_event_buffer(),
            history_capacity: default_history_capacity(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_port() -> u16 {
    9090
}

fn default_max_clients() -> usize {
    100
}

fn default_event_buffer() -> usize {
    50
}

fn default_history_capacity() -> usize {
    1000
}

fn default_channel_capacity() -> usize {
    100
}

/// Narrow capability the engine implements so the dashboard can list and
/// save rules without holding a reference to the engine itself.
pub trait RulesPort: Send + Sync {
    fn list(&self) -> Vec<RuleInfo>;
    /// Admit a rule; an `Err` carries the admission diagnostics.
    fn save(&self, name: &str, code: &str) -> Result<(), String>;
}

/// Fixed-size circular buffer for the live events tab, ordered by insertion.
pub(crate) struct EventRing {
    buffer: Vec<Option<EventUpdate>>,
    index: usize,
    count: usize,
}

impl EventRing {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: (0..capacity.max(1)).map(|_| None).collect(),
            index: 0,
            count: 0,
        }
    }

    pub(crate) fn push(&mut self, event: EventUpdate) {
        let capacity = self.buffer.len();
        self.buffer[self.index] = Some(event);
        self.index = (self.index + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
    }

    /// Chronological copy of the buffered events.
    pub(crate) fn in_order(&self) -> Vec<EventUpdate> {
        let capacity = self.buffer.len();
        let mut events = Vec::with_capacity(self.count);
        let start = if self.count == capacity { self.index } else { 0 };
        for i in 0..self.count {
            if let Some(event) = &self.buffer[(start + i) % capacity] {
                events.push(event.clone());
            }
        }
        events
    }
}

/// Shared dashboard state: latest snapshot, bounded buffers, the WebSocket
/// client set and the alert store.
pub struct DashboardState {
    pub config: DashboardConfig,
    pub(crate) latest_metrics: RwLock<Option<MetricUpdate>>,
    pub(crate) events: Mutex<EventRing>,
    pub(crate) historical_metrics: RwLock<VecDeque<MetricUpdate>>,
    pub(crate) historical_events: RwLock<VecDeque<EventUpdate>>,
    pub(crate) clients: RwLock<HashMap<u64, mpsc::Sender<String>>>,
    next_client_id: AtomicU64,
    pub alerts: std::sync::Arc<AlertStore>,
    pub(crate) rules_port: RwLock<Option<std::sync::Arc<dyn RulesPort>>>,
    pub(crate) metric_tx: mpsc::Sender<MetricUpdate>,
    pub(crate) event_tx: mpsc::Sender<EventUpdate>,
    pub(crate) stop_tx: watch::Sender<bool>,
}

impl DashboardState {
    pub(crate) fn new(
        config: DashboardConfig,
        metric_tx: mpsc::Sender<MetricUpdate>,
        event_tx: mpsc::Sender<EventUpdate>,
        stop_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            latest_metrics: RwLock::new(None),
            events: Mutex::new(EventRing::new(config.event_buffer)),
            historical_metrics: RwLock::new(VecDeque::with_capacity(config.history_capacity)),
            historical_events: RwLock::new(VecDeque::with_capacity(config.history_capacity)),
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            alerts: std::sync::Arc::new(AlertStore::new()),
            rules_port: RwLock::new(None),
            metric_tx,
            event_tx,
            stop_tx,
            config,
        }
    }

    pub(crate) fn stop_rx(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub(crate) fn client_count(&self) -> usize {
        self.clients.read().unwrap().len()
    }

    pub(crate) fn register_client(&self, sender: mpsc::Sender<String>) -> u64 {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        self.clients.write().unwrap().insert(id, sender);
        id
    }

    pub(crate) fn remove_client(&self, id: u64) {
        self.clients.write().unwrap().remove(&id);
    }

    /// JSON-encode `frame` and send it to every connected client; clients
    /// whose channel is gone or full are dropped from the set.
    pub(crate) fn broadcast(&self, frame: &serde_json::Value) {
        let encoded = frame.to_string();

        let clients: Vec<(u64, mpsc::Sender<String>)> = {
            let clients = self.clients.read().unwrap();
            if clients.is_empty() {
                return;
            }
            clients.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let mut failed = Vec::new();
        for (id, tx) in clients {
            if tx.try_send(encoded.clone()).is_err() {
                failed.push(id);
            }
        }

        if !failed.is_empty() {
            let mut clients = self.clients.write().unwrap();
            for id in failed {
                clients.remove(&id);
            }
        }
    }

    pub(crate) fn rules(&self) -> Vec<RuleInfo> {
        self.rules_port
            .read()
            .unwrap()
            .as_ref()
            .map(|port| port.list())
            .unwrap_or_default()
    }
}
