//! Per-UID storage I/O accounting monitor.
//!
//! This library samples the cumulative per-uid and per-task I/O counters the
//! kernel exposes, turns successive samples into interval deltas attributed
//! to the charger state they accrued under, and keeps a bounded history of
//! flushed buckets that can be queried by age and size.
//!
//! # Features
//!
//! - **Reset-safe deltas**: counters that go backwards contribute zero
//! - **Charger attribution**: usage is split by on-charger vs on-battery
//! - **Task breakdown**: per-uid usage carries a per-command-name breakdown
//! - **Bounded history**: age-based pruning plus a hard cap on stored records
//! - **Single lock**: every public operation is serialized on one mutex
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uid_io_monitor::{
//!     ChargerState, FileStatsSource, MonitorConfig, NoopResolver, SystemClock, UidMonitor,
//! };
//!
//! let config = MonitorConfig::default();
//! let monitor = UidMonitor::new(
//!     &config,
//!     Arc::new(FileStatsSource::new("/proc/uid_io/stats")),
//!     Arc::new(NoopResolver),
//!     Arc::new(SystemClock),
//! );
//!
//! monitor.init(ChargerState::On);
//! monitor.report();
//!
//! let history = monitor.dump(0.0, 0, true);
//! println!("{} buckets", history.len());
//! ```

pub mod accumulator;
pub mod io_usage;
pub mod monitor;
pub mod monitor_config;
pub mod monitor_stats;
pub mod records;
pub mod uid_names;
pub mod uid_stats;

// Re-export main types for convenience
pub use accumulator::{IntervalAccumulator, UidIntervalUsage};
pub use io_usage::{ChargerState, IoDirection, IoUsage, Priority};
pub use monitor::{Clock, ManualClock, SystemClock, UidMonitor};
pub use monitor_config::MonitorConfig;
pub use monitor_stats::MonitorStats;
pub use records::{RecordStore, StoreSummary, TimeBucket, UidRecord};
pub use uid_names::{NameResolver, NoopResolver, PasswdResolver, ResolveError, UidNameCache};
pub use uid_stats::{
    FileStatsSource, IoCounters, RawStatsSource, StatsError, TaskSnapshot, UidSnapshot,
    UidStatsMap,
};
