//! HTTP endpoint handlers for the daemon.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/dump`: Recorded per-uid I/O history (text/json)
//! - `/charger`: Current charger state (GET) and charger state changes (POST)

pub mod charger;
pub mod dump;
pub mod health;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use charger::{charger_get_handler, charger_set_handler};
pub use dump::dump_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
