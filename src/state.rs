//! Application state management for the daemon.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background report task.

use prometheus::{Gauge, Registry};
use std::sync::Arc;
use std::time::Instant;
use uid_io_monitor::UidMonitor;

use crate::config::Config;
use crate::metrics::MonitorMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub monitor: Arc<UidMonitor>,
    pub registry: Registry,
    pub metrics: MonitorMetrics,
    pub scrape_duration: Gauge,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
