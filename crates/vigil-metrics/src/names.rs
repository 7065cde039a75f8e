//! The built-in metric name table.
//!
//! The namespace is flat; the dot in a name is syntactic only. Heap figures
//! and counters surface as integers in the DSL, rates and timings as floats.

/// Value shape a built-in metric takes when read from the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Integer,
    Float,
}

pub const HEAP_ALLOC: &str = "heap.alloc";
pub const HEAP_SYS: &str = "heap.sys";
pub const HEAP_IDLE: &str = "heap.idle";
pub const HEAP_INUSE: &str = "heap.inuse";
pub const HEAP_RELEASED: &str = "heap.released";
pub const HEAP_OBJECTS: &str = "heap.objects";
pub const TASKS_COUNT: &str = "goroutines.count";
pub const GC_PAUSE: &str = "gc.pause";
pub const GC_NUM: &str = "gc.num";
pub const GC_CPU_FRACTION: &str = "gc.cpu_fraction";
pub const HTTP_REQUEST_COUNT: &str = "http.request_count";
pub const HTTP_ERROR_COUNT: &str = "http.error_count";
pub const HTTP_ERROR_RATE: &str = "http.error_rate";
pub const HTTP_REQUEST_RATE: &str = "http.request_rate";
pub const HTTP_RESPONSE_TIME: &str = "http.response_time";
pub const HTTP_MAX_RESPONSE_TIME: &str = "http.max_response_time";
pub const HTTP_PENDING_REQUESTS: &str = "http.pending_requests";

/// Every built-in metric with its DSL value shape.
pub const BUILTIN: &[(&str, MetricKind)] = &[
    (HEAP_ALLOC, MetricKind::Integer),
    (HEAP_SYS, MetricKind::Integer),
    (HEAP_IDLE, MetricKind::Integer),
    (HEAP_INUSE, MetricKind::Integer),
    (HEAP_RELEASED, MetricKind::Integer),
    (HEAP_OBJECTS, MetricKind::Integer),
    (TASKS_COUNT, MetricKind::Integer),
    (GC_PAUSE, MetricKind::Float),
    (GC_NUM, MetricKind::Integer),
    (GC_CPU_FRACTION, MetricKind::Float),
    (HTTP_REQUEST_COUNT, MetricKind::Integer),
    (HTTP_ERROR_COUNT, MetricKind::Integer),
    (HTTP_ERROR_RATE, MetricKind::Float),
    (HTTP_REQUEST_RATE, MetricKind::Float),
    (HTTP_RESPONSE_TIME, MetricKind::Float),
    (HTTP_MAX_RESPONSE_TIME, MetricKind::Float),
    (HTTP_PENDING_REQUESTS, MetricKind::Integer),
];

/// Look up the value shape of `category.metric`, or `None` when the pair is
/// not a built-in.
pub fn builtin_kind(category: &str, metric: &str) -> Option<MetricKind> {
    let full = format!("{category}.{metric}");
    BUILTIN
        .iter()
        .find(|(name, _)| *name == full)
        .map(|(_, kind)| *kind)
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN.iter().any(|(n, _)| *n == name)
}

/// The metrics offered for quick correlation analysis on the dashboard.
pub const HEADLINE: &[&str] = &[
    HEAP_ALLOC,
    TASKS_COUNT,
    GC_PAUSE,
    HTTP_RESPONSE_TIME,
    HTTP_REQUEST_RATE,
];
