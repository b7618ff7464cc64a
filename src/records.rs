//! Bounded, time-bucketed history of per-uid I/O usage.
//!
//! The [`RecordStore`] keeps flushed [`TimeBucket`]s ordered by the timestamp
//! of the flush that created them. Memory stays bounded in two ways:
//!
//! - buckets older than the retention window are pruned on every flush
//! - the total number of [`UidRecord`]s across all buckets is capped; when a
//!   new bucket would exceed the cap, whole buckets are evicted oldest first

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::io_usage::IoUsage;

/// Seconds in one day.
pub const DAY_TO_SEC: u64 = 24 * 60 * 60;

/// Seconds in one hour.
pub const HOUR_TO_SEC: u64 = 60 * 60;

/// Buckets older than this many seconds are pruned (5 days).
pub const DEFAULT_RETENTION_SECONDS: u64 = 5 * DAY_TO_SEC;

/// Cap on stored records: 1000 uids in each of 48 buckets.
pub const MAX_UID_RECORDS_SIZE: usize = 1000 * 48;

/// One flushed, non-zero usage entry for a uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UidRecord {
    pub name: String,
    pub uid_ios: IoUsage,
    pub task_ios: BTreeMap<String, IoUsage>,
}

impl UidRecord {
    /// Sum of all eight uid-level cells.
    pub fn total_bytes(&self) -> u64 {
        self.uid_ios.total()
    }
}

/// Everything accrued between `start_ts` and the bucket's key timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    pub start_ts: u64,
    pub entries: Vec<UidRecord>,
}

impl TimeBucket {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Summary of the store contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub buckets: usize,
    pub records: usize,
    pub max_records: usize,
    pub retention_seconds: u64,
    pub oldest_ts: Option<u64>,
    pub newest_ts: Option<u64>,
}

/// What a single [`RecordStore::insert`] had to throw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub evicted_buckets: usize,
    pub evicted_records: usize,
    pub truncated_records: usize,
}

/// Ordered `timestamp -> bucket` history with age and size based eviction.
#[derive(Debug)]
pub struct RecordStore {
    buckets: BTreeMap<u64, TimeBucket>,
    record_count: usize,
    max_records: usize,
    retention_seconds: u64,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(MAX_UID_RECORDS_SIZE, DEFAULT_RETENTION_SECONDS)
    }
}

impl RecordStore {
    /// Creates an empty store.
    ///
    /// A `max_records` of zero is raised to one so a non-empty bucket can
    /// always be stored.
    pub fn new(max_records: usize, retention_seconds: u64) -> Self {
        Self {
            buckets: BTreeMap::new(),
            record_count: 0,
            max_records: max_records.max(1),
            retention_seconds,
        }
    }

    /// Drops every bucket keyed before `now - retention`.
    ///
    /// Nothing is pruned while `now` is not past the retention window, which
    /// keeps the cutoff from underflowing shortly after boot.
    pub fn prune_expired(&mut self, now: u64) -> usize {
        if now <= self.retention_seconds {
            return 0;
        }
        let cutoff = now - self.retention_seconds;
        let kept = self.buckets.split_off(&cutoff);
        let expired = std::mem::replace(&mut self.buckets, kept);

        let removed_records: usize = expired.values().map(TimeBucket::len).sum();
        self.record_count -= removed_records;
        if !expired.is_empty() {
            debug!(
                "Pruned {} buckets ({} records) older than {}",
                expired.len(),
                removed_records,
                cutoff
            );
        }
        expired.len()
    }

    /// Stores `bucket` under `ts`, evicting whole oldest buckets until the
    /// record cap is respected. Empty buckets are ignored.
    ///
    /// A bucket already stored under `ts` is replaced.
    pub fn insert(&mut self, ts: u64, mut bucket: TimeBucket) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        if bucket.is_empty() {
            return outcome;
        }

        if bucket.len() > self.max_records {
            outcome.truncated_records = bucket.len() - self.max_records;
            warn!(
                "Bucket at {} holds {} records, more than the cap of {}; dropping {}",
                ts,
                bucket.len(),
                self.max_records,
                outcome.truncated_records
            );
            bucket.entries.truncate(self.max_records);
        }

        while self.record_count + bucket.len() > self.max_records {
            let Some((_, oldest)) = self.buckets.pop_first() else {
                break;
            };
            self.record_count -= oldest.len();
            outcome.evicted_buckets += 1;
            outcome.evicted_records += oldest.len();
        }

        if outcome.evicted_buckets > 0 {
            debug!(
                "Evicted {} buckets ({} records) to make room for {} new records",
                outcome.evicted_buckets,
                outcome.evicted_records,
                bucket.len()
            );
        }

        self.record_count += bucket.len();
        if let Some(replaced) = self.buckets.insert(ts, bucket) {
            self.record_count -= replaced.len();
        }
        outcome
    }

    /// Returns buckets keyed at or after `first_ts`, keeping only records
    /// whose total bytes strictly exceed `threshold`. Buckets left empty by
    /// the filter are omitted.
    pub fn query(&self, first_ts: u64, threshold: u64) -> BTreeMap<u64, TimeBucket> {
        self.buckets
            .range(first_ts..)
            .filter_map(|(ts, bucket)| {
                let entries: Vec<UidRecord> = bucket
                    .entries
                    .iter()
                    .filter(|rec| rec.total_bytes() > threshold)
                    .cloned()
                    .collect();
                (!entries.is_empty()).then(|| {
                    (
                        *ts,
                        TimeBucket {
                            start_ts: bucket.start_ts,
                            entries,
                        },
                    )
                })
            })
            .collect()
    }

    /// The most recently flushed bucket, if any.
    pub fn latest(&self) -> Option<(u64, &TimeBucket)> {
        self.buckets.iter().next_back().map(|(ts, bucket)| (*ts, bucket))
    }

    /// Number of stored buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of records across all buckets.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            buckets: self.buckets.len(),
            records: self.record_count,
            max_records: self.max_records,
            retention_seconds: self.retention_seconds,
            oldest_ts: self.buckets.keys().next().copied(),
            newest_ts: self.buckets.keys().next_back().copied(),
        }
    }
}
