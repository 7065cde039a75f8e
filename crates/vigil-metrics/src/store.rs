use crate::names;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use vigil_common::types::{HttpStats, MetricSample, RuntimeSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Registering a new custom metric would exceed the configured cap.
    /// Updates to already-registered names are always accepted.
    #[error("maximum number of custom metrics exceeded ({limit})")]
    CustomMetricLimit { limit: usize },
}

/// Read-side capability handed to rule evaluation and the dashboard.
///
/// Windows are interpreted against wall-clock now; an unknown name yields
/// `None` for point reads and the empty-window result (0) for aggregates.
pub trait MetricReader: Send + Sync {
    fn get(&self, name: &str) -> Option<f64>;
    fn avg(&self, name: &str, window: Duration) -> f64;
    fn max(&self, name: &str, window: Duration) -> f64;
    fn trend(&self, name: &str, window: Duration) -> f64;
}

#[derive(Debug)]
struct Series {
    latest: MetricSample,
    history: std::collections::VecDeque<MetricSample>,
}

impl Series {
    fn new(capacity: usize) -> Self {
        Self {
            latest: MetricSample {
                timestamp: Utc::now(),
                value: 0.0,
            },
            history: std::collections::VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    fn push(&mut self, sample: MetricSample, capacity: usize) {
        self.latest = sample;
        self.history.push_back(sample);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }

    fn window(&self, cutoff: DateTime<Utc>) -> Vec<MetricSample> {
        self.history
            .iter()
            .filter(|s| s.timestamp > cutoff)
            .copied()
            .collect()
    }
}

/// Concurrent table of named numeric metrics: a point value plus a bounded
/// time-ordered sample history per name.
///
/// The outer map lock is held only to locate a series; reads and windowed
/// queries on different series never block each other, and writers take a
/// short per-series exclusive lock.
pub struct MetricStore {
    series: RwLock<HashMap<String, Arc<RwLock<Series>>>>,
    max_history: usize,
    max_custom: usize,
    custom_count: RwLock<usize>,
}

impl MetricStore {
    pub fn new(max_history: usize, max_custom: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            max_history: max_history.max(1),
            max_custom,
            custom_count: RwLock::new(0),
        }
    }

    fn series_for(&self, name: &str) -> Arc<RwLock<Series>> {
        if let Some(series) = self.series.read().unwrap().get(name) {
            return Arc::clone(series);
        }
        let mut map = self.series.write().unwrap();
        Arc::clone(
            map.entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(Series::new(self.max_history)))),
        )
    }

    fn existing(&self, name: &str) -> Option<Arc<RwLock<Series>>> {
        self.series.read().unwrap().get(name).map(Arc::clone)
    }

    pub(crate) fn record(&self, name: &str, value: f64, timestamp: DateTime<Utc>) {
        let series = self.series_for(name);
        let mut series = series.write().unwrap();
        series.push(MetricSample { timestamp, value }, self.max_history);
    }

    /// Atomically publish one runtime snapshot under the built-in names.
    pub fn update_runtime(&self, snapshot: &RuntimeSnapshot) {
        let ts = snapshot.timestamp;
        self.record(names::HEAP_ALLOC, snapshot.heap_alloc as f64, ts);
        self.record(names::HEAP_SYS, snapshot.heap_sys as f64, ts);
        self.record(names::HEAP_IDLE, snapshot.heap_idle as f64, ts);
        self.record(names::HEAP_INUSE, snapshot.heap_inuse as f64, ts);
        self.record(names::HEAP_RELEASED, snapshot.heap_released as f64, ts);
        self.record(names::HEAP_OBJECTS, snapshot.heap_objects as f64, ts);
        self.record(names::TASKS_COUNT, snapshot.task_count as f64, ts);
        self.record(names::GC_PAUSE, snapshot.gc_pause_ms, ts);
        self.record(names::GC_NUM, snapshot.gc_num as f64, ts);
        self.record(names::GC_CPU_FRACTION, snapshot.gc_cpu_fraction, ts);
    }

    /// Publish the probe's current HTTP statistics.
    pub fn update_http(&self, stats: &HttpStats) {
        let ts = Utc::now();
        self.record(names::HTTP_REQUEST_COUNT, stats.request_count as f64, ts);
        self.record(names::HTTP_ERROR_COUNT, stats.error_count as f64, ts);
        self.record(names::HTTP_ERROR_RATE, stats.error_rate, ts);
        self.record(names::HTTP_REQUEST_RATE, stats.request_rate, ts);
        self.record(names::HTTP_RESPONSE_TIME, stats.avg_response_time, ts);
        self.record(
            names::HTTP_MAX_RESPONSE_TIME,
            stats.max_response_time,
            ts,
        );
        self.record(
            names::HTTP_PENDING_REQUESTS,
            stats.pending_requests as f64,
            ts,
        );
    }

    /// Register or update a user-defined metric.
    ///
    /// New names are bounded by the custom-metric cap; updating an existing
    /// name always succeeds.
    pub fn update_custom(&self, name: &str, value: f64) -> Result<(), StoreError> {
        if !names::is_builtin(name) && self.existing(name).is_none() {
            let mut count = self.custom_count.write().unwrap();
            if *count >= self.max_custom {
                return Err(StoreError::CustomMetricLimit {
                    limit: self.max_custom,
                });
            }
            *count += 1;
        }
        self.record(name, value, Utc::now());
        Ok(())
    }

    pub fn custom_metric_count(&self) -> usize {
        *self.custom_count.read().unwrap()
    }

    /// Latest sample for a name, if any has been recorded.
    pub fn latest(&self, name: &str) -> Option<MetricSample> {
        let series = self.existing(name)?;
        let series = series.read().unwrap();
        if series.history.is_empty() {
            None
        } else {
            Some(series.latest)
        }
    }

    /// All samples newer than `now - window`, in timestamp order.
    pub fn window(&self, name: &str, window: Duration) -> Vec<MetricSample> {
        let Some(series) = self.existing(name) else {
            return Vec::new();
        };
        let cutoff = Utc::now() - chrono::Duration::milliseconds(window.as_millis() as i64);
        let guard = series.read().unwrap();
        guard.window(cutoff)
    }
}

impl MetricReader for MetricStore {
    fn get(&self, name: &str) -> Option<f64> {
        self.latest(name).map(|s| s.value)
    }

    fn avg(&self, name: &str, window: Duration) -> f64 {
        let samples = self.window(name, window);
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64
    }

    fn max(&self, name: &str, window: Duration) -> f64 {
        let samples = self.window(name, window);
        if samples.is_empty() {
            return 0.0;
        }
        samples
            .iter()
            .map(|s| s.value)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Rate of change in value-units per minute between the first and last
    /// sample of the window. Fewer than two samples, or a zero span, yield 0.
    fn trend(&self, name: &str, window: Duration) -> f64 {
        let samples = self.window(name, window);
        if samples.len() < 2 {
            return 0.0;
        }
        let first = samples[0];
        let last = samples[samples.len() - 1];
        let minutes = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;
        if minutes == 0.0 {
            return 0.0;
        }
        (last.value - first.value) / minutes
    }
}
