//! Plain-text rendering of recorded per-uid I/O history.
//!
//! Shared by the `/dump` endpoint and the `dump` subcommand.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use uid_io_monitor::{ChargerState, IoDirection, IoUsage, Priority, TimeBucket};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Formats a Unix timestamp as UTC.
pub fn format_ts(ts: u64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Human readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= GIB {
        format!("{:.2} GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Bytes for one direction and charger state, both priorities summed.
fn cell(usage: &IoUsage, dir: IoDirection, charger: ChargerState) -> u64 {
    Priority::ALL
        .iter()
        .map(|&prio| usage.get(dir, prio, charger))
        .fold(0u64, u64::saturating_add)
}

fn write_row(out: &mut String, label: &str, usage: &IoUsage) {
    writeln!(
        out,
        "{:32} | {:>12} | {:>12} | {:>12} | {:>12}",
        label,
        format_bytes(cell(usage, IoDirection::Read, ChargerState::On)),
        format_bytes(cell(usage, IoDirection::Read, ChargerState::Off)),
        format_bytes(cell(usage, IoDirection::Write, ChargerState::On)),
        format_bytes(cell(usage, IoDirection::Write, ChargerState::Off)),
    )
    .ok();
}

/// Renders buckets oldest first, each record followed by its tasks.
pub fn render_history_text(history: &BTreeMap<u64, TimeBucket>) -> String {
    let mut out = String::new();
    writeln!(out, "UID I/O HISTORY").ok();
    writeln!(out, "===============").ok();

    if history.is_empty() {
        writeln!(out).ok();
        writeln!(out, "No recorded I/O in the requested window.").ok();
        return out;
    }

    for (ts, bucket) in history {
        writeln!(out).ok();
        writeln!(
            out,
            "[{} .. {}] {} uids",
            format_ts(bucket.start_ts),
            format_ts(*ts),
            bucket.len()
        )
        .ok();
        writeln!(
            out,
            "{:32} | {:>12} | {:>12} | {:>12} | {:>12}",
            "uid / task", "read on", "read off", "write on", "write off"
        )
        .ok();
        writeln!(out, "{}", "-".repeat(95)).ok();

        for record in &bucket.entries {
            write_row(&mut out, &record.name, &record.uid_ios);
            for (comm, usage) in &record.task_ios {
                write_row(&mut out, &format!("  {}", comm), usage);
            }
        }
    }
    out
}
