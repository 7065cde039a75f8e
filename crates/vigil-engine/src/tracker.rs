use crate::error::ResourceLimitError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

/// Cooperative cancellation signal shared between an evaluation and its
/// supervisor: an explicit flag plus an optional hard deadline.
#[derive(Clone)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelFlag {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Memory usage at one check, relative to the evaluation's baseline.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    pub current_alloc: u64,
    pub initial_alloc: u64,
    pub max_allowed: u64,
    /// Percentage of the budget consumed.
    pub budget_used: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CpuStats {
    pub cpu_time_used: Duration,
    pub wall_time_used: Duration,
    pub max_cpu_time: Duration,
    /// CPU time over wall time, as a percentage.
    pub cpu_efficiency: f64,
}

/// Per-evaluation budget enforcement: a memory allowance above the baseline
/// allocation, a CPU-time budget, and the wall-clock deadline carried by the
/// cancel flag. Any violation cancels the evaluation.
pub struct ResourceTracker {
    cancel: CancelFlag,
    initial_alloc: u64,
    max_allowed: u64,
    budget: u64,
    start_cpu: Option<Duration>,
    max_cpu: Duration,
    started: Instant,
}

impl ResourceTracker {
    pub fn new(memory_limit: u64, cpu_limit: Duration, wall_limit: Duration) -> Self {
        let initial_alloc = process_memory();
        Self {
            cancel: CancelFlag::new(Some(Instant::now() + wall_limit)),
            initial_alloc,
            max_allowed: initial_alloc.saturating_add(memory_limit),
            budget: memory_limit.max(1),
            start_cpu: process_cpu_time(),
            max_cpu: cpu_limit,
            started: Instant::now(),
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check every budget; the first violation cancels the evaluation and is
    /// returned. Cancellation itself also reports as a violation.
    pub fn check_limits(&self) -> Result<(), ResourceLimitError> {
        if self.cancel.is_cancelled() {
            return Err(ResourceLimitError::Cancelled);
        }

        let current = process_memory();
        if current > self.max_allowed {
            self.cancel.cancel();
            return Err(ResourceLimitError::Memory {
                current,
                limit: self.max_allowed,
            });
        }

        match self.cpu_used() {
            Some(used) => {
                if used > self.max_cpu {
                    self.cancel.cancel();
                    return Err(ResourceLimitError::Cpu {
                        used,
                        limit: self.max_cpu,
                    });
                }
            }
            None => {
                // CPU-time introspection unavailable: wall clock stands in.
                let elapsed = self.started.elapsed();
                if elapsed > self.max_cpu {
                    self.cancel.cancel();
                    return Err(ResourceLimitError::WallClock {
                        elapsed,
                        limit: self.max_cpu,
                    });
                }
            }
        }

        Ok(())
    }

    fn cpu_used(&self) -> Option<Duration> {
        let start = self.start_cpu?;
        process_cpu_time().map(|now| now.saturating_sub(start))
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let current_alloc = process_memory();
        MemoryStats {
            current_alloc,
            initial_alloc: self.initial_alloc,
            max_allowed: self.max_allowed,
            budget_used: current_alloc.saturating_sub(self.initial_alloc) as f64
                / self.budget as f64
                * 100.0,
        }
    }

    pub fn cpu_stats(&self) -> CpuStats {
        let wall_time_used = self.started.elapsed();
        let cpu_time_used = self.cpu_used().unwrap_or(wall_time_used);
        let cpu_efficiency = if wall_time_used.as_nanos() > 0 {
            cpu_time_used.as_nanos() as f64 / wall_time_used.as_nanos() as f64 * 100.0
        } else {
            0.0
        };
        CpuStats {
            cpu_time_used,
            wall_time_used,
            max_cpu_time: self.max_cpu,
            cpu_efficiency,
        }
    }
}

/// Resident set size of the current process, in bytes.
pub(crate) fn process_memory() -> u64 {
    static SAMPLER: OnceLock<Mutex<(System, Option<Pid>)>> = OnceLock::new();
    let sampler = SAMPLER.get_or_init(|| Mutex::new((System::new(), sysinfo::get_current_pid().ok())));
    let mut guard = sampler.lock().unwrap();
    let (system, pid) = &mut *guard;
    let Some(pid) = *pid else {
        return 0;
    };
    system.refresh_process(pid);
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}

/// Cumulative user+system CPU time of the current process.
#[cfg(unix)]
pub(crate) fn process_cpu_time() -> Option<Duration> {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = Duration::from_secs(usage.ru_utime.tv_sec as u64)
        + Duration::from_micros(usage.ru_utime.tv_usec as u64);
    let system = Duration::from_secs(usage.ru_stime.tv_sec as u64)
        + Duration::from_micros(usage.ru_stime.tv_usec as u64);
    Some(user + system)
}

#[cfg(not(unix))]
pub(crate) fn process_cpu_time() -> Option<Duration> {
    None
}
