//! Generate testdata command implementation.
//!
//! Writes a synthetic per-uid I/O statistics file in the same text format the
//! kernel uses, so the daemon and the `dump` subcommand can be exercised on
//! machines without kernel support. With `--grow` the counters of an existing
//! file are advanced instead, which produces non-zero deltas on the next
//! report cycle.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use uid_io_monitor::uid_stats::parse_uid_io_stats;
use uid_io_monitor::{IoCounters, TaskSnapshot, UidSnapshot, UidStatsMap};

// Constants for byte conversions
const MB: u64 = 1024 * 1024;

// Constants for test data generation ranges
const MAX_INITIAL_BYTES: u64 = 512 * MB;
const MAX_GROWTH_BYTES: u64 = 8 * MB;
const MAX_FSYNC: u64 = 500;
const FIRST_APP_UID: u32 = 10_000;

/// Well-known system uids emitted before the application uids.
const SYSTEM_UIDS: [u32; 6] = [0, 1000, 1001, 1013, 1041, 2000];

/// Command names used for generated task rows.
const TASK_NAMES: [&str; 12] = [
    "surfaceflinger",
    "mediaserver",
    "cameraserver",
    "logd",
    "installd",
    "dex2oat",
    "system_server",
    "sdcard",
    "netd",
    "app_process",
    "kworker",
    "sync_worker",
];

/// Generates (or grows) a synthetic statistics file.
pub fn command_generate_testdata(
    output: PathBuf,
    uids: usize,
    max_tasks: usize,
    grow: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();

    let snapshot = if grow && output.exists() {
        let content = fs::read_to_string(&output)?;
        let mut snapshot = parse_uid_io_stats(&content).uids;
        if snapshot.is_empty() {
            return Err(format!("{} contains no valid uid rows", output.display()).into());
        }
        grow_snapshot(&mut rng, &mut snapshot);
        debug!("Grew counters of {} uids", snapshot.len());
        snapshot
    } else {
        debug!(
            "Generating statistics: uids={}, max_tasks={}, output={}",
            uids,
            max_tasks,
            output.display()
        );
        generate_snapshot(&mut rng, uids, max_tasks)
    };

    let content = render_stats(&snapshot);
    fs::write(&output, &content)?;

    let tasks: usize = snapshot.values().map(|s| s.tasks.len()).sum();
    println!(
        "✅ {} statistics: {} uids, {} tasks in {}",
        if grow { "Grew" } else { "Generated" },
        snapshot.len(),
        tasks,
        output.display()
    );
    Ok(())
}

fn random_counters(rng: &mut impl Rng, max_bytes: u64) -> [IoCounters; 2] {
    let mut io = [IoCounters::default(); 2];
    for counters in io.iter_mut() {
        counters.read_bytes = rng.gen_range(0..max_bytes);
        counters.write_bytes = rng.gen_range(0..max_bytes);
        // rchar/wchar include page-cache hits, so they are at least the storage bytes.
        counters.rchar = counters.read_bytes + rng.gen_range(0..max_bytes);
        counters.wchar = counters.write_bytes + rng.gen_range(0..max_bytes);
        counters.fsync = rng.gen_range(0..MAX_FSYNC);
    }
    io
}

fn generate_snapshot(rng: &mut impl Rng, uids: usize, max_tasks: usize) -> UidStatsMap {
    let mut snapshot = UidStatsMap::default();
    let mut next_pid: i32 = 300;

    let uid_ids = SYSTEM_UIDS
        .iter()
        .copied()
        .chain((0u32..).map(|i| FIRST_APP_UID + i))
        .take(uids);

    for uid in uid_ids {
        let mut entry = UidSnapshot::new(uid, random_counters(rng, MAX_INITIAL_BYTES));
        let task_count = rng.gen_range(0..=max_tasks);
        for _ in 0..task_count {
            let comm = TASK_NAMES.choose(rng).copied().unwrap_or("worker");
            entry.tasks.insert(
                next_pid,
                TaskSnapshot {
                    pid: next_pid,
                    comm: comm.to_string(),
                    io: random_counters(rng, MAX_INITIAL_BYTES / 4),
                },
            );
            next_pid += rng.gen_range(1..50);
        }
        snapshot.insert(uid, entry);
    }
    snapshot
}

fn grow_counters(rng: &mut impl Rng, io: &mut [IoCounters; 2]) {
    let growth = random_counters(rng, MAX_GROWTH_BYTES);
    for (counters, delta) in io.iter_mut().zip(growth.iter()) {
        counters.rchar = counters.rchar.saturating_add(delta.rchar);
        counters.wchar = counters.wchar.saturating_add(delta.wchar);
        counters.read_bytes = counters.read_bytes.saturating_add(delta.read_bytes);
        counters.write_bytes = counters.write_bytes.saturating_add(delta.write_bytes);
        counters.fsync = counters.fsync.saturating_add(delta.fsync / 10);
    }
}

fn grow_snapshot(rng: &mut impl Rng, snapshot: &mut UidStatsMap) {
    for entry in snapshot.values_mut() {
        // Leave some uids idle so they drop out of the next bucket.
        if rng.gen_bool(0.3) {
            continue;
        }
        grow_counters(rng, &mut entry.io);
        for task in entry.tasks.values_mut() {
            grow_counters(rng, &mut task.io);
        }
    }
}

fn write_counters(out: &mut String, io: &[IoCounters; 2], sep: char) {
    for counters in io {
        write!(
            out,
            "{sep}{}{sep}{}{sep}{}{sep}{}",
            counters.rchar, counters.wchar, counters.read_bytes, counters.write_bytes
        )
        .ok();
    }
    write!(out, "{sep}{}{sep}{}", io[0].fsync, io[1].fsync).ok();
}

/// Renders a snapshot in kernel row order: each uid row followed by its tasks.
pub fn render_stats(snapshot: &UidStatsMap) -> String {
    let mut uids: Vec<&UidSnapshot> = snapshot.values().collect();
    uids.sort_by_key(|s| s.uid);

    let mut out = String::new();
    for entry in uids {
        write!(out, "{}", entry.uid).ok();
        write_counters(&mut out, &entry.io, ' ');
        out.push('\n');

        for task in entry.tasks.values() {
            write!(out, "task,{},{}", task.comm, task.pid).ok();
            write_counters(&mut out, &task.io, ',');
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_file_parses_back() {
        let mut rng = rand::thread_rng();
        let snapshot = generate_snapshot(&mut rng, 10, 3);
        assert_eq!(snapshot.len(), 10);
        assert!(snapshot.contains_key(&0));
        assert!(snapshot.contains_key(&10_003));

        let parsed = parse_uid_io_stats(&render_stats(&snapshot));
        assert_eq!(parsed.malformed_rows, 0);
        assert_eq!(parsed.orphan_tasks, 0);
        assert_eq!(parsed.uids.len(), 10);
        for (uid, entry) in &snapshot {
            assert_eq!(parsed.uids[uid].io, entry.io);
            assert_eq!(parsed.uids[uid].tasks.len(), entry.tasks.len());
        }
    }

    #[test]
    fn test_grow_never_decreases_counters() {
        let mut rng = rand::thread_rng();
        let before = generate_snapshot(&mut rng, 8, 2);
        let mut after = before.clone();
        grow_snapshot(&mut rng, &mut after);

        for (uid, old) in &before {
            let new = &after[uid];
            for prio in 0..2 {
                assert!(new.io[prio].read_bytes >= old.io[prio].read_bytes);
                assert!(new.io[prio].write_bytes >= old.io[prio].write_bytes);
            }
        }
    }

    #[test]
    fn test_generate_and_grow_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("stats.txt");

        command_generate_testdata(path.clone(), 5, 2, false).expect("generate");
        let first = fs::read_to_string(&path).expect("read");
        command_generate_testdata(path.clone(), 5, 2, true).expect("grow");
        let second = fs::read_to_string(&path).expect("read");

        let a = parse_uid_io_stats(&first).uids;
        let b = parse_uid_io_stats(&second).uids;
        assert_eq!(a.len(), b.len());
    }
}
