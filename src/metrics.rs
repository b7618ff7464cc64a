//! Prometheus metrics definitions for uid-io-monitor.
//!
//! The monitor itself keeps its own counters; this module mirrors them into a
//! Prometheus registry on every scrape, together with the per-uid totals of
//! the newest stored bucket.

use prometheus::{Gauge, GaugeVec, Opts, Registry};
use std::sync::atomic::Ordering;
use uid_io_monitor::{ChargerState, IoDirection, Priority, TimeBucket, UidMonitor};

/// Collection of Prometheus metrics exported by the daemon.
#[derive(Clone)]
pub struct MonitorMetrics {
    // ========== Store Metrics ==========
    pub store_buckets: Gauge,
    pub store_records: Gauge,
    pub store_max_records: Gauge,
    pub store_oldest_bucket_timestamp: Gauge,
    pub store_newest_bucket_timestamp: Gauge,

    // ========== Sampling Metrics ==========
    pub samples_total: Gauge,
    pub sample_failures_total: Gauge,
    pub malformed_rows_total: Gauge,
    pub orphan_task_rows_total: Gauge,
    pub name_lookup_failures_total: Gauge,
    pub last_sample_duration_seconds: Gauge,

    // ========== Report Metrics ==========
    pub report_cycles_total: Gauge,
    pub skipped_reports_total: Gauge,
    pub buckets_evicted_total: Gauge,
    pub buckets_pruned_total: Gauge,
    pub charger_transitions_total: Gauge,
    pub charger_on: Gauge,

    // ========== Latest Bucket Metrics ==========
    pub uid_bucket_bytes: GaugeVec, // labels: uid, direction, priority, charger
}

impl MonitorMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        // ========== Store Metrics ==========
        let store_buckets = Gauge::new(
            "uid_io_store_buckets",
            "Number of time buckets currently held in the record store",
        )?;
        let store_records = Gauge::new(
            "uid_io_store_records",
            "Number of per-uid records currently held across all buckets",
        )?;
        let store_max_records = Gauge::new(
            "uid_io_store_max_records",
            "Configured cap on the number of stored per-uid records",
        )?;
        let store_oldest_bucket_timestamp = Gauge::new(
            "uid_io_store_oldest_bucket_timestamp_seconds",
            "Flush timestamp of the oldest stored bucket (0 if empty)",
        )?;
        let store_newest_bucket_timestamp = Gauge::new(
            "uid_io_store_newest_bucket_timestamp_seconds",
            "Flush timestamp of the newest stored bucket (0 if empty)",
        )?;

        // ========== Sampling Metrics ==========
        let samples_total = Gauge::new(
            "uid_io_samples_total",
            "Successful reads of the per-uid I/O statistics source",
        )?;
        let sample_failures_total = Gauge::new(
            "uid_io_sample_failures_total",
            "Failed or empty reads of the per-uid I/O statistics source",
        )?;
        let malformed_rows_total = Gauge::new(
            "uid_io_malformed_rows_total",
            "Rows skipped because they could not be parsed",
        )?;
        let orphan_task_rows_total = Gauge::new(
            "uid_io_orphan_task_rows_total",
            "Task rows skipped because no uid row preceded them",
        )?;
        let name_lookup_failures_total = Gauge::new(
            "uid_io_name_lookup_failures_total",
            "Batch uid name lookups that failed",
        )?;
        let last_sample_duration_seconds = Gauge::new(
            "uid_io_last_sample_duration_seconds",
            "Time spent reading and parsing the last sample",
        )?;

        // ========== Report Metrics ==========
        let report_cycles_total = Gauge::new(
            "uid_io_report_cycles_total",
            "Completed report cycles",
        )?;
        let skipped_reports_total = Gauge::new(
            "uid_io_skipped_reports_total",
            "Report cycles skipped because the statistics source could not be read",
        )?;
        let buckets_evicted_total = Gauge::new(
            "uid_io_buckets_evicted_total",
            "Buckets evicted to keep the record count under the cap",
        )?;
        let buckets_pruned_total = Gauge::new(
            "uid_io_buckets_pruned_total",
            "Buckets pruned because they fell out of the retention window",
        )?;
        let charger_transitions_total = Gauge::new(
            "uid_io_charger_transitions_total",
            "Charger state changes applied",
        )?;
        let charger_on = Gauge::new(
            "uid_io_charger_on",
            "Current charger state (1 = on charger, 0 = on battery)",
        )?;

        // ========== Latest Bucket Metrics ==========
        let uid_bucket_bytes = GaugeVec::new(
            Opts::new(
                "uid_io_latest_bucket_bytes",
                "Bytes accrued per uid in the newest stored bucket",
            ),
            &["uid", "direction", "priority", "charger"],
        )?;

        registry.register(Box::new(store_buckets.clone()))?;
        registry.register(Box::new(store_records.clone()))?;
        registry.register(Box::new(store_max_records.clone()))?;
        registry.register(Box::new(store_oldest_bucket_timestamp.clone()))?;
        registry.register(Box::new(store_newest_bucket_timestamp.clone()))?;
        registry.register(Box::new(samples_total.clone()))?;
        registry.register(Box::new(sample_failures_total.clone()))?;
        registry.register(Box::new(malformed_rows_total.clone()))?;
        registry.register(Box::new(orphan_task_rows_total.clone()))?;
        registry.register(Box::new(name_lookup_failures_total.clone()))?;
        registry.register(Box::new(last_sample_duration_seconds.clone()))?;
        registry.register(Box::new(report_cycles_total.clone()))?;
        registry.register(Box::new(skipped_reports_total.clone()))?;
        registry.register(Box::new(buckets_evicted_total.clone()))?;
        registry.register(Box::new(buckets_pruned_total.clone()))?;
        registry.register(Box::new(charger_transitions_total.clone()))?;
        registry.register(Box::new(charger_on.clone()))?;
        registry.register(Box::new(uid_bucket_bytes.clone()))?;

        Ok(Self {
            store_buckets,
            store_records,
            store_max_records,
            store_oldest_bucket_timestamp,
            store_newest_bucket_timestamp,
            samples_total,
            sample_failures_total,
            malformed_rows_total,
            orphan_task_rows_total,
            name_lookup_failures_total,
            last_sample_duration_seconds,
            report_cycles_total,
            skipped_reports_total,
            buckets_evicted_total,
            buckets_pruned_total,
            charger_transitions_total,
            charger_on,
            uid_bucket_bytes,
        })
    }

    /// Copies the monitor's current counters and store state into the gauges.
    pub fn update_from(&self, monitor: &UidMonitor) {
        let summary = monitor.store_summary();
        self.store_buckets.set(summary.buckets as f64);
        self.store_records.set(summary.records as f64);
        self.store_max_records.set(summary.max_records as f64);
        self.store_oldest_bucket_timestamp
            .set(summary.oldest_ts.unwrap_or(0) as f64);
        self.store_newest_bucket_timestamp
            .set(summary.newest_ts.unwrap_or(0) as f64);

        let stats = monitor.stats();
        let load = |c: &std::sync::atomic::AtomicU64| c.load(Ordering::Relaxed) as f64;
        self.samples_total.set(load(&stats.samples_ok));
        self.sample_failures_total.set(load(&stats.sample_failures));
        self.malformed_rows_total.set(load(&stats.malformed_rows));
        self.orphan_task_rows_total.set(load(&stats.orphan_task_rows));
        self.name_lookup_failures_total
            .set(load(&stats.name_lookup_failures));
        self.last_sample_duration_seconds
            .set(stats.sample_duration_ms.summary().last / 1000.0);
        self.report_cycles_total.set(load(&stats.report_cycles));
        self.skipped_reports_total.set(load(&stats.skipped_reports));
        self.buckets_evicted_total.set(load(&stats.buckets_evicted));
        self.buckets_pruned_total.set(load(&stats.buckets_pruned));
        self.charger_transitions_total
            .set(load(&stats.charger_transitions));
        self.charger_on.set(match monitor.charger_state() {
            ChargerState::On => 1.0,
            ChargerState::Off => 0.0,
        });

        // Uids drop out of the label set once they stop appearing in buckets.
        self.uid_bucket_bytes.reset();
        if let Some((_, bucket)) = monitor.latest_bucket() {
            self.set_bucket(&bucket);
        }
    }

    fn set_bucket(&self, bucket: &TimeBucket) {
        for record in &bucket.entries {
            for dir in IoDirection::ALL {
                for prio in Priority::ALL {
                    for charger in ChargerState::ALL {
                        let bytes = record.uid_ios.get(dir, prio, charger);
                        if bytes == 0 {
                            continue;
                        }
                        self.uid_bucket_bytes
                            .with_label_values(&[
                                record.name.as_str(),
                                direction_label(dir),
                                priority_label(prio),
                                charger.as_str(),
                            ])
                            .set(bytes as f64);
                    }
                }
            }
        }
    }
}

fn direction_label(dir: IoDirection) -> &'static str {
    match dir {
        IoDirection::Read => "read",
        IoDirection::Write => "write",
    }
}

fn priority_label(prio: Priority) -> &'static str {
    match prio {
        Priority::Foreground => "foreground",
        Priority::Background => "background",
    }
}
