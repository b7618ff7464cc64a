//! The uid I/O monitor facade.
//!
//! [`UidMonitor`] owns all mutable state (last snapshot, current interval,
//! record store, charger state, name cache) behind one mutex. Each public
//! operation takes the lock for its whole duration and runs synchronously,
//! so a periodic `report()` and a concurrent `dump(force_report = true)`
//! never observe each other half-way.
//!
//! # Usage
//!
//! ```rust,no_run
//! use uid_io_monitor::{ChargerState, MonitorConfig, UidMonitor};
//!
//! let monitor = UidMonitor::from_config(&MonitorConfig::default());
//! monitor.init(ChargerState::On);
//!
//! // Later, periodically:
//! monitor.report();
//!
//! // Everything from the last 24 hours above 1 MiB:
//! for (ts, bucket) in monitor.dump(24.0, 1 << 20, false) {
//!     println!("{} -> {}: {} uids", bucket.start_ts, ts, bucket.entries.len());
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::accumulator::IntervalAccumulator;
use crate::io_usage::ChargerState;
use crate::monitor_config::MonitorConfig;
use crate::monitor_stats::MonitorStats;
use crate::records::{RecordStore, StoreSummary, TimeBucket, HOUR_TO_SEC};
use crate::uid_names::{NameResolver, PasswdResolver, UidNameCache};
use crate::uid_stats::{parse_uid_io_stats, FileStatsSource, RawStatsSource, StatsError, UidStatsMap};

/// Source of wall-clock seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

struct MonitorState {
    last_snapshot: UidStatsMap,
    accumulator: IntervalAccumulator,
    store: RecordStore,
    charger_state: ChargerState,
    names: UidNameCache,
}

/// Per-uid storage I/O accounting monitor.
pub struct UidMonitor {
    state: Mutex<MonitorState>,
    source: Arc<dyn RawStatsSource>,
    resolver: Arc<dyn NameResolver>,
    clock: Arc<dyn Clock>,
    stats: Arc<MonitorStats>,
}

impl UidMonitor {
    /// Creates a monitor with explicit collaborators.
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn RawStatsSource>,
        resolver: Arc<dyn NameResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(MonitorState {
                last_snapshot: UidStatsMap::default(),
                accumulator: IntervalAccumulator::new(now),
                store: RecordStore::new(config.max_records, config.retention_seconds),
                charger_state: config.initial_charger_state,
                names: UidNameCache::new(),
            }),
            source,
            resolver,
            clock,
            stats: Arc::new(MonitorStats::new()),
        }
    }

    /// Creates a monitor reading `config.stats_path`, naming uids from
    /// `config.passwd_path`, on the system clock.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config,
            Arc::new(FileStatsSource::new(&config.stats_path)),
            Arc::new(PasswdResolver::new(&config.passwd_path)),
            Arc::new(SystemClock),
        )
    }

    pub fn stats(&self) -> &Arc<MonitorStats> {
        &self.stats
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds the last snapshot from a full read and sets the charger state.
    ///
    /// Returns false if the stats source could not be read; the monitor then
    /// starts from an empty baseline.
    pub fn init(&self, charger_state: ChargerState) -> bool {
        let mut state = self.lock();
        state.charger_state = charger_state;
        state.accumulator.set_start_ts(self.clock.now());

        match self.read_snapshot_locked(&mut state) {
            Ok(snapshot) => {
                info!(
                    "uid monitor initialized with {} uids, charger {}",
                    snapshot.len(),
                    charger_state
                );
                state.last_snapshot = snapshot;
                true
            }
            Err(e) => {
                error!("uid monitor init could not read stats: {}", e);
                self.stats.record_sample_failure();
                false
            }
        }
    }

    /// Runs one sample + flush cycle.
    pub fn report(&self) {
        let mut state = self.lock();
        self.report_locked(&mut state);
    }

    /// Returns stored buckets newer than `hours` (0 = all), keeping records
    /// whose total bytes exceed `threshold`. A negative or non-finite `hours`
    /// matches nothing.
    ///
    /// With `force_report`, the in-flight interval is flushed first, under the
    /// same lock as the query.
    pub fn dump(&self, hours: f64, threshold: u64, force_report: bool) -> BTreeMap<u64, TimeBucket> {
        let mut state = self.lock();
        if force_report {
            self.report_locked(&mut state);
        }

        self.stats.record_dump();
        if !hours.is_finite() || hours < 0.0 {
            return BTreeMap::new();
        }

        let first_ts = if hours != 0.0 {
            let first = self.clock.now() as f64 - hours * HOUR_TO_SEC as f64;
            if first > 0.0 {
                first as u64
            } else {
                0
            }
        } else {
            0
        };

        state.store.query(first_ts, threshold)
    }

    /// Switches the charger state used for subsequent accounting.
    ///
    /// Usage accrued so far is first attributed to the old state. Does not
    /// flush a bucket. A call with the current state does nothing.
    ///
    /// Returns the state that was in effect before the call.
    pub fn set_charger_state(&self, charger_state: ChargerState) -> ChargerState {
        let mut state = self.lock();
        let previous = state.charger_state;
        if previous == charger_state {
            return previous;
        }

        self.update_usage_locked(&mut state);
        debug!("charger state {} -> {}", previous, charger_state);
        state.charger_state = charger_state;
        self.stats.record_charger_transition();
        previous
    }

    pub fn charger_state(&self) -> ChargerState {
        self.lock().charger_state
    }

    /// Reads a fresh cumulative snapshot without touching the accounting
    /// state. Returns an empty map if the source cannot be read.
    pub fn get_uid_io_stats(&self) -> UidStatsMap {
        let mut state = self.lock();
        match self.read_snapshot_locked(&mut state) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("failed to read uid io stats: {}", e);
                self.stats.record_sample_failure();
                UidStatsMap::default()
            }
        }
    }

    pub fn store_summary(&self) -> StoreSummary {
        self.lock().store.summary()
    }

    /// A copy of the newest stored bucket and its flush timestamp.
    pub fn latest_bucket(&self) -> Option<(u64, TimeBucket)> {
        self.lock()
            .store
            .latest()
            .map(|(ts, bucket)| (ts, bucket.clone()))
    }

    fn read_snapshot_locked(&self, state: &mut MonitorState) -> Result<UidStatsMap, StatsError> {
        let start = Instant::now();
        let raw = self.source.read_raw()?;
        let parsed = parse_uid_io_stats(&raw);
        if parsed.uids.is_empty() {
            return Err(StatsError::Empty {
                path: PathBuf::from(self.source.describe()),
            });
        }

        let mut uids = parsed.uids;
        let refresh = state.names.apply(&mut uids, self.resolver.as_ref());
        if refresh.requested > 0 {
            self.stats.record_name_lookup(refresh.failed);
        }

        self.stats.record_sample(
            uids.len(),
            parsed.malformed_rows,
            parsed.orphan_tasks,
            start.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(uids)
    }

    /// Diffs a fresh snapshot against the last one into the accumulator.
    /// Leaves everything untouched if the read fails.
    fn update_usage_locked(&self, state: &mut MonitorState) -> bool {
        let current = match self.read_snapshot_locked(state) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("{}", e);
                self.stats.record_sample_failure();
                return false;
            }
        };

        let charger = state.charger_state;
        state
            .accumulator
            .accumulate(&state.last_snapshot, &current, charger);
        state.last_snapshot = current;
        true
    }

    fn prune_locked(&self, state: &mut MonitorState, now: u64) {
        let pruned = state.store.prune_expired(now);
        if pruned > 0 {
            self.stats.record_pruned(pruned);
        }
    }

    fn add_records_locked(&self, state: &mut MonitorState, now: u64) {
        self.prune_locked(state, now);

        let bucket = state.accumulator.flush(now);
        if bucket.is_empty() {
            debug!("no uid I/O since {}, nothing to record", bucket.start_ts);
            self.stats.record_empty_bucket();
            return;
        }

        let records = bucket.len();
        let outcome = state.store.insert(now, bucket);
        self.stats.record_bucket_stored(
            outcome.evicted_buckets,
            outcome.evicted_records,
            outcome.truncated_records,
        );
        debug!(
            "stored {} uid records at {} ({} total)",
            records,
            now,
            state.store.record_count()
        );
    }

    /// Retention is enforced even when the read fails; only the flush is
    /// skipped, so the open interval carries over to the next good read.
    fn report_locked(&self, state: &mut MonitorState) {
        let now = self.clock.now();
        if !self.update_usage_locked(state) {
            self.prune_locked(state, now);
            self.stats.record_skipped_report();
            return;
        }
        self.add_records_locked(state, now);
        self.stats.record_report();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid_names::NoopResolver;
    use std::sync::atomic::AtomicBool;

    struct ScriptedSource {
        content: Mutex<String>,
        fail: AtomicBool,
    }

    impl ScriptedSource {
        fn new(content: &str) -> Arc<Self> {
            Arc::new(Self {
                content: Mutex::new(content.to_string()),
                fail: AtomicBool::new(false),
            })
        }

        fn set(&self, content: &str) {
            *self.content.lock().unwrap() = content.to_string();
        }
    }

    impl RawStatsSource for ScriptedSource {
        fn read_raw(&self) -> Result<String, StatsError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StatsError::Read {
                    path: PathBuf::from("scripted"),
                    source: std::io::Error::other("unavailable"),
                });
            }
            Ok(self.content.lock().unwrap().clone())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn monitor(source: Arc<ScriptedSource>, clock: Arc<ManualClock>) -> UidMonitor {
        UidMonitor::new(
            &MonitorConfig::default(),
            source,
            Arc::new(NoopResolver),
            clock,
        )
    }

    #[test]
    fn test_failed_read_keeps_state() {
        let source = ScriptedSource::new("1000 0 0 100 0 0 0 0 0 0 0\n");
        let clock = Arc::new(ManualClock::new(1_000));
        let m = monitor(source.clone(), clock.clone());
        assert!(m.init(ChargerState::On));

        source.fail.store(true, Ordering::SeqCst);
        clock.advance(600);
        m.report();
        assert_eq!(m.store_summary().buckets, 0);
        assert_eq!(m.stats().skipped_reports.load(Ordering::Relaxed), 1);

        // The baseline from init is still in place: only 50 new bytes count.
        source.fail.store(false, Ordering::SeqCst);
        source.set("1000 0 0 150 0 0 0 0 0 0 0\n");
        clock.advance(600);
        m.report();
        let dump = m.dump(0.0, 0, false);
        assert_eq!(dump.len(), 1);
        let bucket = dump.values().next().unwrap();
        assert_eq!(bucket.entries[0].total_bytes(), 50);
        // The interval began at init, not at the skipped report.
        assert_eq!(bucket.start_ts, 1_000);
    }

    #[test]
    fn test_empty_source_is_a_failed_read() {
        let source = ScriptedSource::new("\n\n");
        let m = monitor(source, Arc::new(ManualClock::new(10)));
        assert!(!m.init(ChargerState::Off));
        assert_eq!(m.charger_state(), ChargerState::Off);
        assert!(m.get_uid_io_stats().is_empty());
    }

    #[test]
    fn test_get_uid_io_stats_does_not_touch_baseline() {
        let source = ScriptedSource::new("1000 0 0 100 0 0 0 0 0 0 0\n");
        let clock = Arc::new(ManualClock::new(1_000));
        let m = monitor(source.clone(), clock.clone());
        m.init(ChargerState::On);

        source.set("1000 0 0 400 0 0 0 0 0 0 0\n");
        let snap = m.get_uid_io_stats();
        assert_eq!(snap[&1000].io[0].read_bytes, 400);

        clock.advance(60);
        m.report();
        let dump = m.dump(0.0, 0, false);
        assert_eq!(dump[&1_060].entries[0].total_bytes(), 300);
    }
}
