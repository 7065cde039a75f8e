//! Embeddable runtime-observability engine.
//!
//! The [`Engine`] owns every other component: the metric store, the runtime
//! collector, the HTTP probe, the action registry, the dashboard server and
//! the rule registry. Rules are written in a small DSL and evaluated once
//! per tick against live metrics under per-evaluation resource budgets.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! let engine = vigil_engine::Engine::new();
//! engine.start();
//!
//! engine.add_rule(
//!     "memory_check",
//!     r#"when heap.alloc > 200MB { alert("High memory usage") }"#,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use actions::{ActionRegistry, ConsoleAlertHandler, DashboardForwarder, LogHandler};
pub use config::{EngineConfig, ResourceLimits};
pub use engine::Engine;
pub use error::{AdmitError, EvalError, ResourceLimitError};
pub use eval::{Evaluator, Value};
pub use tracker::{CancelFlag, CpuStats, MemoryStats, ResourceTracker};
