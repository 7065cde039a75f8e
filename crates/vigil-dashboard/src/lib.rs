//! Web dashboard for the vigil engine.
//!
//! [`DashboardServer`] serves the REST surface under `/api`, a WebSocket
//! fan-out of live metrics and events at `/ws`, historical replay, metric
//! correlation analytics, and the in-memory [`AlertStore`].
//!
//! The server never reaches back into the engine directly: rule listing and
//! saving go through the narrow [`RulesPort`] capability the engine
//! implements, and metric/event frames arrive over bounded channels.

pub mod alert_store;
pub mod api;
pub mod broadcast;
pub mod correlation;
pub mod logging;
pub mod playback;
pub mod server;
pub mod state;
pub mod ws;


pub use alert_store::{AlertIngestHandler, AlertStore, AlertStoreError};
pub use server::DashboardServer;
pub use state::{DashboardConfig, DashboardState, RulesPort};
