//! Operational statistics for the uid monitor.
//!
//! Every failure the monitor absorbs (unreadable stats source, malformed rows,
//! name lookup errors) is counted here so it stays visible without aborting
//! anything.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock as StdRwLock};
use std::time::{Instant, SystemTime};

/// Last, smallest, largest and mean value of an observed series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeriesSummary {
    pub count: u64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Default)]
struct Series {
    summary: SeriesSummary,
    sum: f64,
}

/// A series of observations (sample durations, uids per sample) that any
/// thread may append to.
#[derive(Default)]
pub struct SeriesTracker {
    series: Mutex<Series>,
}

impl SeriesTracker {
    pub fn observe(&self, value: f64) {
        let mut guard = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        let Series { summary, sum } = &mut *guard;

        let first = summary.count == 0;
        summary.count += 1;
        *sum += value;
        summary.last = value;
        summary.min = if first { value } else { summary.min.min(value) };
        summary.max = if first { value } else { summary.max.max(value) };
        summary.mean = *sum / summary.count as f64;
    }

    pub fn summary(&self) -> SeriesSummary {
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary
    }
}

/// Counters describing what the monitor did and what it had to skip.
pub struct MonitorStats {
    // Sampling
    pub samples_ok: AtomicU64,
    pub sample_failures: AtomicU64,
    pub malformed_rows: AtomicU64,
    pub orphan_task_rows: AtomicU64,
    pub sample_duration_ms: SeriesTracker,
    pub uids_per_sample: SeriesTracker,

    // Naming
    pub name_lookups: AtomicU64,
    pub name_lookup_failures: AtomicU64,

    // Flushing
    pub report_cycles: AtomicU64,
    pub skipped_reports: AtomicU64,
    pub buckets_stored: AtomicU64,
    pub empty_buckets_discarded: AtomicU64,
    pub buckets_evicted: AtomicU64,
    pub records_evicted: AtomicU64,
    pub records_truncated: AtomicU64,
    pub buckets_pruned: AtomicU64,

    // Queries and charger transitions
    pub dumps: AtomicU64,
    pub charger_transitions: AtomicU64,

    pub start_time: Instant,
    pub last_report_time: StdRwLock<Option<SystemTime>>,
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self {
            samples_ok: AtomicU64::new(0),
            sample_failures: AtomicU64::new(0),
            malformed_rows: AtomicU64::new(0),
            orphan_task_rows: AtomicU64::new(0),
            sample_duration_ms: SeriesTracker::default(),
            uids_per_sample: SeriesTracker::default(),
            name_lookups: AtomicU64::new(0),
            name_lookup_failures: AtomicU64::new(0),
            report_cycles: AtomicU64::new(0),
            skipped_reports: AtomicU64::new(0),
            buckets_stored: AtomicU64::new(0),
            empty_buckets_discarded: AtomicU64::new(0),
            buckets_evicted: AtomicU64::new(0),
            records_evicted: AtomicU64::new(0),
            records_truncated: AtomicU64::new(0),
            buckets_pruned: AtomicU64::new(0),
            dumps: AtomicU64::new(0),
            charger_transitions: AtomicU64::new(0),
            start_time: Instant::now(),
            last_report_time: StdRwLock::new(None),
        }
    }
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl MonitorStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_sample(&self, uids: usize, malformed: u64, orphans: u64, duration_ms: f64) {
        bump(&self.samples_ok, 1);
        bump(&self.malformed_rows, malformed);
        bump(&self.orphan_task_rows, orphans);
        self.uids_per_sample.observe(uids as f64);
        self.sample_duration_ms.observe(duration_ms);
    }

    pub fn record_sample_failure(&self) {
        bump(&self.sample_failures, 1);
    }

    pub fn record_name_lookup(&self, failed: bool) {
        bump(&self.name_lookups, 1);
        if failed {
            bump(&self.name_lookup_failures, 1);
        }
    }

    pub fn record_report(&self) {
        bump(&self.report_cycles, 1);
        if let Ok(mut guard) = self.last_report_time.write() {
            *guard = Some(SystemTime::now());
        }
    }

    pub fn record_skipped_report(&self) {
        bump(&self.skipped_reports, 1);
    }

    pub fn record_bucket_stored(&self, evicted_buckets: usize, evicted_records: usize, truncated: usize) {
        bump(&self.buckets_stored, 1);
        bump(&self.buckets_evicted, evicted_buckets as u64);
        bump(&self.records_evicted, evicted_records as u64);
        bump(&self.records_truncated, truncated as u64);
    }

    pub fn record_empty_bucket(&self) {
        bump(&self.empty_buckets_discarded, 1);
    }

    pub fn record_pruned(&self, buckets: usize) {
        bump(&self.buckets_pruned, buckets as u64);
    }

    pub fn record_dump(&self) {
        bump(&self.dumps, 1);
    }

    pub fn record_charger_transition(&self) {
        bump(&self.charger_transitions, 1);
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Seconds since the last completed report, if any.
    pub fn seconds_since_last_report(&self) -> Option<u64> {
        let guard = self.last_report_time.read().ok()?;
        let last = (*guard)?;
        SystemTime::now()
            .duration_since(last)
            .ok()
            .map(|d| d.as_secs())
    }

    /// Renders a plain-text table for the /health endpoint.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        writeln!(out, "MONITOR STATISTICS").ok();
        writeln!(out, "==================").ok();
        writeln!(out).ok();
        writeln!(out, "{:32} | {:>12}", "Counter", "Value").ok();
        writeln!(out, "{}", "-".repeat(47)).ok();

        let rows: [(&str, u64); 16] = [
            ("samples_ok", load(&self.samples_ok)),
            ("sample_failures", load(&self.sample_failures)),
            ("malformed_rows", load(&self.malformed_rows)),
            ("orphan_task_rows", load(&self.orphan_task_rows)),
            ("name_lookups", load(&self.name_lookups)),
            ("name_lookup_failures", load(&self.name_lookup_failures)),
            ("report_cycles", load(&self.report_cycles)),
            ("skipped_reports", load(&self.skipped_reports)),
            ("buckets_stored", load(&self.buckets_stored)),
            ("empty_buckets_discarded", load(&self.empty_buckets_discarded)),
            ("buckets_evicted", load(&self.buckets_evicted)),
            ("records_evicted", load(&self.records_evicted)),
            ("records_truncated", load(&self.records_truncated)),
            ("buckets_pruned", load(&self.buckets_pruned)),
            ("dumps", load(&self.dumps)),
            ("charger_transitions", load(&self.charger_transitions)),
        ];
        for (name, value) in rows {
            writeln!(out, "{:32} | {:>12}", name, value).ok();
        }

        writeln!(out).ok();
        let d = self.sample_duration_ms.summary();
        writeln!(
            out,
            "sample duration ms: last={:.2} avg={:.2} max={:.2} min={:.2} (n={})",
            d.last, d.mean, d.max, d.min, d.count
        )
        .ok();
        let u = self.uids_per_sample.summary();
        writeln!(
            out,
            "uids per sample:    last={:.0} avg={:.1} max={:.0}",
            u.last, u.mean, u.max
        )
        .ok();
        match self.seconds_since_last_report() {
            Some(secs) => writeln!(out, "last report:        {}s ago", secs).ok(),
            None => writeln!(out, "last report:        never").ok(),
        };
        out
    }
}
