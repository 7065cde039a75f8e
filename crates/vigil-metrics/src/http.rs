use crate::store::MetricStore;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use vigil_common::types::HttpStats;

/// Per-request HTTP statistics, updated with atomic counters so request
/// handling never serializes on a lock.
///
/// Wire it into an axum router with
/// `axum::middleware::from_fn_with_state(probe.clone(), HttpProbe::track)`.
pub struct HttpProbe {
    request_count: AtomicI64,
    error_count: AtomicI64,
    /// Sum of response times, nanoseconds.
    total_response_ns: AtomicI64,
    max_response_ns: AtomicI64,
    pending: AtomicI64,
    buffer_index: AtomicI64,
    samples: Mutex<Vec<i64>>,
    max_samples: usize,
    started_at: Instant,
    store: Option<Arc<MetricStore>>,
}

impl HttpProbe {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = if max_samples == 0 { 1000 } else { max_samples };
        Self {
            request_count: AtomicI64::new(0),
            error_count: AtomicI64::new(0),
            total_response_ns: AtomicI64::new(0),
            max_response_ns: AtomicI64::new(0),
            pending: AtomicI64::new(0),
            buffer_index: AtomicI64::new(0),
            samples: Mutex::new(Vec::with_capacity(max_samples)),
            max_samples,
            started_at: Instant::now(),
            store: None,
        }
    }

    /// A probe that publishes its statistics into `store` after every
    /// request.
    pub fn with_store(max_samples: usize, store: Arc<MetricStore>) -> Self {
        let mut probe = Self::new(max_samples);
        probe.store = Some(store);
        probe
    }

    /// axum middleware wrapping the inner service.
    pub async fn track(State(probe): State<Arc<HttpProbe>>, req: Request, next: Next) -> Response {
        let start = Instant::now();
        probe.pending.fetch_add(1, Ordering::Relaxed);

        let response = next.run(req).await;

        probe.pending.fetch_sub(1, Ordering::Relaxed);
        let elapsed_ns = start.elapsed().as_nanos().min(i64::MAX as u128) as i64;
        probe.record(elapsed_ns, response.status().as_u16());

        if let Some(store) = &probe.store {
            store.update_http(&probe.stats());
        }

        response
    }

    /// Record one completed request. `status` is the final response status;
    /// handlers that only write a body count as 200.
    pub fn record(&self, elapsed_ns: i64, status: u16) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_response_ns.fetch_add(elapsed_ns, Ordering::Relaxed);

        let mut current = self.max_response_ns.load(Ordering::Relaxed);
        while elapsed_ns > current {
            match self.max_response_ns.compare_exchange_weak(
                current,
                elapsed_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        if status >= 400 {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }

        let mut samples = self.samples.lock().unwrap();
        if samples.len() < self.max_samples {
            samples.push(elapsed_ns);
        } else {
            let index = self.buffer_index.fetch_add(1, Ordering::Relaxed) + 1;
            samples[(index as usize) % self.max_samples] = elapsed_ns;
        }
    }

    pub fn stats(&self) -> HttpStats {
        let request_count = self.request_count.load(Ordering::Relaxed);
        let error_count = self.error_count.load(Ordering::Relaxed);
        let total_ns = self.total_response_ns.load(Ordering::Relaxed);
        let max_ns = self.max_response_ns.load(Ordering::Relaxed);
        let pending = self.pending.load(Ordering::Relaxed);

        let mut stats = HttpStats {
            request_count,
            error_count,
            max_response_time: max_ns as f64 / 1_000_000.0,
            pending_requests: pending,
            ..HttpStats::default()
        };

        if request_count > 0 {
            stats.error_rate = error_count as f64 / request_count as f64 * 100.0;
            stats.avg_response_time = total_ns as f64 / request_count as f64 / 1_000_000.0;
            let uptime = self.started_at.elapsed().as_secs_f64();
            if uptime > 0.0 {
                stats.request_rate = request_count as f64 / uptime;
            }
        }

        stats
    }

    /// Recent response-time samples in nanoseconds, unordered.
    pub fn response_time_samples(&self) -> Vec<i64> {
        self.samples.lock().unwrap().clone()
    }

    /// Clear all counters. Useful in tests.
    pub fn reset(&self) {
        self.request_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.total_response_ns.store(0, Ordering::Relaxed);
        self.max_response_ns.store(0, Ordering::Relaxed);
        self.pending.store(0, Ordering::Relaxed);
        self.buffer_index.store(0, Ordering::Relaxed);
        self.samples.lock().unwrap().clear();
    }
}
