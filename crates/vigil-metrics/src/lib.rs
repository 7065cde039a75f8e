//! Metric collection and storage for the vigil engine.
//!
//! [`MetricStore`] is the concurrent table every other component reads and
//! writes: the [`RuntimeCollector`] publishes host-process snapshots on a
//! fixed cadence, the [`HttpProbe`] publishes request statistics as requests
//! complete, and rule evaluation reads points and time windows back out
//! through the [`MetricReader`] capability.

pub mod http;
pub mod names;
pub mod runtime;
pub mod store;

#[cfg(test)]
mod tests;

pub use http::HttpProbe;
pub use names::MetricKind;
pub use runtime::{GcStats, RuntimeCollector};
pub use store::{MetricReader, MetricStore, StoreError};
