//! Snapshot delta computation and the current-interval accumulator.
//!
//! Two cumulative snapshots are diffed counter by counter. A counter that went
//! backwards (reset or wraparound) contributes nothing for that interval.
//! Deltas are added to the accumulator cell for the charger state that was
//! active while they accrued.
//!
//! Task usage is aggregated by command name rather than pid: two processes
//! with the same `comm` under one uid are summed together.

use std::collections::BTreeMap;

use crate::io_usage::{ChargerState, IoDirection, IoUsage, Priority};
use crate::records::{TimeBucket, UidRecord};
use crate::uid_stats::{IoCounters, UidStatsMap};

/// Usage accrued by one uid since the last flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidIntervalUsage {
    pub uid_ios: IoUsage,
    pub task_ios: BTreeMap<String, IoUsage>,
}

/// `current - previous`, clamped at zero.
#[inline]
pub fn clamped_delta(current: u64, previous: u64) -> u64 {
    current.saturating_sub(previous)
}

/// Adds the read/write byte deltas between two counter sets into `usage`.
fn add_deltas(
    usage: &mut IoUsage,
    prio: Priority,
    charger: ChargerState,
    current: &IoCounters,
    previous: &IoCounters,
) {
    usage.add(
        IoDirection::Read,
        prio,
        charger,
        clamped_delta(current.read_bytes, previous.read_bytes),
    );
    usage.add(
        IoDirection::Write,
        prio,
        charger,
        clamped_delta(current.write_bytes, previous.write_bytes),
    );
}

/// Running totals since the last flush, keyed by uid display name.
#[derive(Debug, Clone, Default)]
pub struct IntervalAccumulator {
    usage: BTreeMap<String, UidIntervalUsage>,
    start_ts: u64,
}

impl IntervalAccumulator {
    pub fn new(start_ts: u64) -> Self {
        Self {
            usage: BTreeMap::new(),
            start_ts,
        }
    }

    /// Timestamp the current interval started at.
    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    pub fn set_start_ts(&mut self, ts: u64) {
        self.start_ts = ts;
    }

    /// Usage accrued so far for the uid with the given display name.
    pub fn get(&self, name: &str) -> Option<&UidIntervalUsage> {
        self.usage.get(name)
    }

    /// Number of uids with an entry (including all-zero ones).
    pub fn len(&self) -> usize {
        self.usage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_empty()
    }

    /// Diffs `current` against `previous` and merges the clamped deltas.
    ///
    /// A uid or task missing from `previous` is diffed against zero.
    pub fn accumulate(
        &mut self,
        previous: &UidStatsMap,
        current: &UidStatsMap,
        charger: ChargerState,
    ) {
        let zero = IoCounters::default();

        for (uid, snapshot) in current {
            let last = previous.get(uid);
            let usage = self.usage.entry(snapshot.name.clone()).or_default();

            for prio in Priority::ALL {
                let prev = last.map_or(&zero, |l| l.io(prio));
                add_deltas(&mut usage.uid_ios, prio, charger, snapshot.io(prio), prev);
            }

            for (pid, task) in &snapshot.tasks {
                let last_task = last.and_then(|l| l.tasks.get(pid));
                let task_usage = usage.task_ios.entry(task.comm.clone()).or_default();

                for prio in Priority::ALL {
                    let prev = last_task.map_or(&zero, |t| t.io(prio));
                    add_deltas(task_usage, prio, charger, task.io(prio), prev);
                }
            }
        }
    }

    /// Drains the accumulator into a bucket and starts a new interval at
    /// `flush_ts`.
    ///
    /// Only uids with non-zero usage become records, and within them only
    /// non-zero tasks are kept. The returned bucket may be empty.
    pub fn flush(&mut self, flush_ts: u64) -> TimeBucket {
        let usage = std::mem::take(&mut self.usage);
        let start_ts = std::mem::replace(&mut self.start_ts, flush_ts);

        let entries = usage
            .into_iter()
            .filter(|(_, u)| !u.uid_ios.is_zero())
            .map(|(name, u)| UidRecord {
                name,
                uid_ios: u.uid_ios,
                task_ios: u
                    .task_ios
                    .into_iter()
                    .filter(|(_, t)| !t.is_zero())
                    .collect(),
            })
            .collect();

        TimeBucket { start_ts, entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid_stats::{TaskSnapshot, UidSnapshot};

    fn counters(read_bytes: u64, write_bytes: u64) -> IoCounters {
        IoCounters {
            read_bytes,
            write_bytes,
            ..Default::default()
        }
    }

    fn uid(uid: u32, fg: IoCounters, bg: IoCounters) -> UidSnapshot {
        UidSnapshot::new(uid, [fg, bg])
    }

    fn task(pid: i32, comm: &str, fg: IoCounters) -> TaskSnapshot {
        TaskSnapshot {
            pid,
            comm: comm.to_string(),
            io: [fg, IoCounters::default()],
        }
    }

    fn stats(entries: Vec<UidSnapshot>) -> UidStatsMap {
        entries.into_iter().map(|s| (s.uid, s)).collect()
    }

    #[test]
    fn test_clamped_delta() {
        assert_eq!(clamped_delta(150, 100), 50);
        assert_eq!(clamped_delta(100, 150), 0);
        assert_eq!(clamped_delta(0, 0), 0);
    }

    #[test]
    fn test_foreground_read_delta_on_charger() {
        let previous = stats(vec![uid(1000, counters(100, 0), IoCounters::default())]);
        let current = stats(vec![uid(1000, counters(150, 0), IoCounters::default())]);

        let mut acc = IntervalAccumulator::new(0);
        acc.accumulate(&previous, &current, ChargerState::On);

        let usage = acc.get("1000").expect("uid 1000 accumulated");
        assert_eq!(
            usage
                .uid_ios
                .get(IoDirection::Read, Priority::Foreground, ChargerState::On),
            50
        );
        assert_eq!(usage.uid_ios.total(), 50);
    }

    #[test]
    fn test_reset_counter_clamps_only_that_cell() {
        let previous = stats(vec![uid(1000, counters(500, 100), counters(10, 10))]);
        let current = stats(vec![uid(1000, counters(20, 130), counters(15, 10))]);

        let mut acc = IntervalAccumulator::new(0);
        acc.accumulate(&previous, &current, ChargerState::Off);
        let u = &acc.get("1000").expect("accumulated").uid_ios;

        assert_eq!(u.get(IoDirection::Read, Priority::Foreground, ChargerState::Off), 0);
        assert_eq!(u.get(IoDirection::Write, Priority::Foreground, ChargerState::Off), 30);
        assert_eq!(u.get(IoDirection::Read, Priority::Background, ChargerState::Off), 5);
        assert_eq!(u.get(IoDirection::Write, Priority::Background, ChargerState::Off), 0);
    }

    #[test]
    fn test_new_uid_uses_zero_baseline() {
        let previous = UidStatsMap::default();
        let current = stats(vec![uid(2000, counters(7, 3), counters(1, 1))]);

        let mut acc = IntervalAccumulator::new(0);
        acc.accumulate(&previous, &current, ChargerState::On);
        assert_eq!(acc.get("2000").expect("accumulated").uid_ios.total(), 12);
    }

    #[test]
    fn test_tasks_with_same_comm_are_summed() {
        let mut prev_uid = uid(1000, IoCounters::default(), IoCounters::default());
        prev_uid.tasks.insert(1, task(1, "worker", counters(10, 0)));
        prev_uid.tasks.insert(2, task(2, "worker", counters(20, 0)));

        let mut cur_uid = uid(1000, counters(100, 0), IoCounters::default());
        cur_uid.tasks.insert(1, task(1, "worker", counters(15, 0)));
        cur_uid.tasks.insert(2, task(2, "worker", counters(27, 0)));
        // New pid: zero baseline.
        cur_uid.tasks.insert(3, task(3, "logger", counters(4, 0)));

        let mut acc = IntervalAccumulator::new(0);
        acc.accumulate(&stats(vec![prev_uid]), &stats(vec![cur_uid]), ChargerState::On);

        let usage = acc.get("1000").expect("accumulated");
        assert_eq!(usage.task_ios.len(), 2);
        assert_eq!(usage.task_ios["worker"].total(), 12);
        assert_eq!(usage.task_ios["logger"].total(), 4);
    }

    #[test]
    fn test_charger_state_selects_cell() {
        let s0 = stats(vec![uid(1000, counters(0, 0), IoCounters::default())]);
        let s1 = stats(vec![uid(1000, counters(10, 0), IoCounters::default())]);
        let s2 = stats(vec![uid(1000, counters(25, 0), IoCounters::default())]);

        let mut acc = IntervalAccumulator::new(0);
        acc.accumulate(&s0, &s1, ChargerState::On);
        acc.accumulate(&s1, &s2, ChargerState::Off);

        let u = &acc.get("1000").expect("accumulated").uid_ios;
        assert_eq!(u.get(IoDirection::Read, Priority::Foreground, ChargerState::On), 10);
        assert_eq!(u.get(IoDirection::Read, Priority::Foreground, ChargerState::Off), 15);
    }

    #[test]
    fn test_flush_drops_zero_usage_and_resets() {
        let same = stats(vec![uid(1000, counters(5, 5), IoCounters::default())]);
        let mut acc = IntervalAccumulator::new(100);
        acc.accumulate(&same, &same, ChargerState::On);
        assert_eq!(acc.len(), 1);

        let bucket = acc.flush(700);
        assert!(bucket.is_empty());
        assert_eq!(bucket.start_ts, 100);
        assert!(acc.is_empty());
        assert_eq!(acc.start_ts(), 700);
    }

    #[test]
    fn test_flush_keeps_nonzero_tasks_only() {
        let mut prev_uid = uid(1000, IoCounters::default(), IoCounters::default());
        prev_uid.tasks.insert(1, task(1, "idle", counters(10, 10)));
        let mut cur_uid = uid(1000, counters(50, 0), IoCounters::default());
        cur_uid.tasks.insert(1, task(1, "idle", counters(10, 10)));
        cur_uid.tasks.insert(2, task(2, "busy", counters(50, 0)));

        let mut acc = IntervalAccumulator::new(0);
        acc.accumulate(&stats(vec![prev_uid]), &stats(vec![cur_uid]), ChargerState::On);
        let bucket = acc.flush(60);

        assert_eq!(bucket.entries.len(), 1);
        let rec = &bucket.entries[0];
        assert_eq!(rec.name, "1000");
        assert_eq!(rec.task_ios.keys().collect::<Vec<_>>(), vec!["busy"]);
    }
}
