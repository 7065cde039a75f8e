use crate::store::MetricStore;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::task::JoinHandle;
use vigil_common::types::RuntimeSnapshot;

/// Collector-pause figures supplied by an embedder probe.
///
/// The host runtime has no tracing collector of its own, so these default to
/// zero; applications embedding a managed runtime can publish real numbers
/// through [`RuntimeCollector::set_gc_probe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    pub pause_ms: f64,
    pub num: u64,
    pub cpu_fraction: f64,
}

type GcProbe = Box<dyn Fn() -> GcStats + Send + Sync>;

struct Sampler {
    system: System,
    pid: Option<Pid>,
}

impl Sampler {
    fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Memory figures for the current process: (resident, virtual) in bytes.
    fn memory(&mut self) -> (u64, u64) {
        let Some(pid) = self.pid else {
            return (0, 0);
        };
        self.system.refresh_process(pid);
        match self.system.process(pid) {
            Some(process) => (process.memory(), process.virtual_memory()),
            None => (0, 0),
        }
    }
}

/// Periodically samples host-process counters and publishes them into the
/// metric store under the built-in names.
///
/// The collector also keeps its own bounded ring of snapshots so callers can
/// read the raw snapshot history without going through the store.
pub struct RuntimeCollector {
    store: Arc<MetricStore>,
    interval: Duration,
    max_history: usize,
    sampler: Mutex<Sampler>,
    history: RwLock<VecDeque<RuntimeSnapshot>>,
    current: RwLock<Option<RuntimeSnapshot>>,
    gc_probe: RwLock<Option<GcProbe>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RuntimeCollector {
    pub fn new(store: Arc<MetricStore>, interval: Duration, max_history: usize) -> Self {
        Self {
            store,
            interval,
            max_history: max_history.max(1),
            sampler: Mutex::new(Sampler::new()),
            history: RwLock::new(VecDeque::new()),
            current: RwLock::new(None),
            gc_probe: RwLock::new(None),
            task: Mutex::new(None),
        }
    }

    /// Install a probe for collector-pause figures.
    pub fn set_gc_probe(&self, probe: impl Fn() -> GcStats + Send + Sync + 'static) {
        *self.gc_probe.write().unwrap() = Some(Box::new(probe));
    }

    /// Begin background sampling. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }
        let collector = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(collector.interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                collector.collect();
            }
        }));
    }

    /// Halt background sampling. Idempotent; safe before `start`.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }

    /// Take one sample now and publish it. Exposed for tests and for
    /// embedders that drive collection themselves.
    pub fn collect(&self) {
        let (resident, virt) = self.sampler.lock().unwrap().memory();
        let gc = self
            .gc_probe
            .read()
            .unwrap()
            .as_ref()
            .map(|probe| probe())
            .unwrap_or_default();

        let task_count = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks() as u64)
            .unwrap_or(0);

        let snapshot = RuntimeSnapshot {
            heap_alloc: resident,
            heap_sys: virt,
            heap_idle: virt.saturating_sub(resident),
            heap_inuse: resident,
            heap_released: 0,
            heap_objects: 0,
            task_count,
            gc_pause_ms: gc.pause_ms,
            gc_num: gc.num,
            gc_cpu_fraction: gc.cpu_fraction,
            timestamp: Utc::now(),
        };

        {
            let mut history = self.history.write().unwrap();
            history.push_back(snapshot);
            while history.len() > self.max_history {
                history.pop_front();
            }
        }
        *self.current.write().unwrap() = Some(snapshot);
        self.store.update_runtime(&snapshot);
    }

    pub fn current(&self) -> Option<RuntimeSnapshot> {
        *self.current.read().unwrap()
    }

    /// Snapshots newer than `now - window`, oldest first.
    pub fn history_window(&self, window: Duration) -> Vec<RuntimeSnapshot> {
        let cutoff = Utc::now() - chrono::Duration::milliseconds(window.as_millis() as i64);
        self.history
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.timestamp > cutoff)
            .copied()
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().unwrap().len()
    }
}

impl Drop for RuntimeCollector {
    fn drop(&mut self) {
        self.stop();
    }
}
