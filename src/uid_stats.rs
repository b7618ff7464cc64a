//! Raw per-UID and per-task I/O counter parsing.
//!
//! The kernel exposes cumulative counters as a single text stream with two
//! row shapes:
//!
//! ```text
//! <uid> <fg_rchar> <fg_wchar> <fg_read_bytes> <fg_write_bytes> <bg_rchar> <bg_wchar> <bg_read_bytes> <bg_write_bytes> <fg_fsync> <bg_fsync>
//! task,<comm>,<pid>,<fg_rchar>,<fg_wchar>,<fg_read_bytes>,<fg_write_bytes>,<bg_rchar>,<bg_wchar>,<bg_read_bytes>,<bg_write_bytes>,<fg_fsync>,<bg_fsync>
//! ```
//!
//! Task rows carry no uid. They belong to whichever uid row was most recently
//! parsed successfully, so row order matters.

use ahash::AHashMap as HashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::io_usage::Priority;

/// Default kernel path for per-uid I/O statistics.
pub const UID_IO_STATS_PATH: &str = "/proc/uid_io/stats";

/// Prefix that marks a task-detail row.
pub const TASK_ROW_PREFIX: &str = "task";

const UID_ROW_MIN_FIELDS: usize = 11;
const TASK_ROW_MIN_FIELDS: usize = 13;

/// Cumulative counters for one priority class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub rchar: u64,
    pub wchar: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub fsync: u64,
}

/// Cumulative counters for a single task (thread group) within a uid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub pid: i32,
    pub comm: String,
    pub io: [IoCounters; 2],
}

impl TaskSnapshot {
    pub fn io(&self, prio: Priority) -> &IoCounters {
        &self.io[prio as usize]
    }
}

/// Cumulative counters for a uid plus its tasks, keyed by pid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidSnapshot {
    pub uid: u32,
    pub name: String,
    pub io: [IoCounters; 2],
    pub tasks: BTreeMap<i32, TaskSnapshot>,
}

impl UidSnapshot {
    pub fn new(uid: u32, io: [IoCounters; 2]) -> Self {
        Self {
            uid,
            name: uid.to_string(),
            io,
            tasks: BTreeMap::new(),
        }
    }

    pub fn io(&self, prio: Priority) -> &IoCounters {
        &self.io[prio as usize]
    }
}

/// A full-system snapshot of cumulative counters.
pub type UidStatsMap = HashMap<u32, UidSnapshot>;

/// Schema violation in a single row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("field {index} is not a valid number: {value:?}")]
    InvalidNumber { index: usize, value: String },

    #[error("row does not start with the 'task' prefix")]
    NotATaskRow,
}

/// Failure to obtain a raw snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} contained no usable uid rows", .path.display())]
    Empty { path: PathBuf },
}

/// Supplies the raw text of the per-uid statistics stream on demand.
pub trait RawStatsSource: Send + Sync {
    /// Reads the complete current stream.
    fn read_raw(&self) -> Result<String, StatsError>;

    /// Human-readable origin used in log messages.
    fn describe(&self) -> String;
}

/// Reads the statistics stream from a file, normally `/proc/uid_io/stats`.
#[derive(Debug, Clone)]
pub struct FileStatsSource {
    path: PathBuf,
}

impl FileStatsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileStatsSource {
    fn default() -> Self {
        Self::new(UID_IO_STATS_PATH)
    }
}

impl RawStatsSource for FileStatsSource {
    fn read_raw(&self) -> Result<String, StatsError> {
        fs::read_to_string(&self.path).map_err(|source| StatsError::Read {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Result of parsing one full stream.
#[derive(Debug, Default)]
pub struct ParsedStats {
    pub uids: UidStatsMap,
    /// Rows skipped because they failed schema validation.
    pub malformed_rows: u64,
    /// Task rows seen before any valid uid row.
    pub orphan_tasks: u64,
}

fn parse_field<T: std::str::FromStr>(fields: &[&str], index: usize) -> Result<T, RowError> {
    let raw = fields[index].trim();
    raw.parse().map_err(|_| RowError::InvalidNumber {
        index,
        value: raw.to_string(),
    })
}

/// Parses the ten counters starting at `offset`:
/// fg rchar/wchar/read/write, bg rchar/wchar/read/write, fg fsync, bg fsync.
fn parse_counters(fields: &[&str], offset: usize) -> Result<[IoCounters; 2], RowError> {
    let mut io = [IoCounters::default(); 2];
    for (slot, prio) in Priority::ALL.iter().enumerate() {
        let base = offset + slot * 4;
        let counters = &mut io[*prio as usize];
        counters.rchar = parse_field(fields, base)?;
        counters.wchar = parse_field(fields, base + 1)?;
        counters.read_bytes = parse_field(fields, base + 2)?;
        counters.write_bytes = parse_field(fields, base + 3)?;
    }
    io[Priority::Foreground as usize].fsync = parse_field(fields, offset + 8)?;
    io[Priority::Background as usize].fsync = parse_field(fields, offset + 9)?;
    Ok(io)
}

/// Parses a whitespace-separated uid-summary row.
pub fn parse_uid_row(line: &str) -> Result<(u32, [IoCounters; 2]), RowError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < UID_ROW_MIN_FIELDS {
        return Err(RowError::TooFewFields {
            expected: UID_ROW_MIN_FIELDS,
            found: fields.len(),
        });
    }

    let uid = parse_field(&fields, 0)?;
    let io = parse_counters(&fields, 1)?;
    Ok((uid, io))
}

/// Parses a comma-separated task-detail row.
pub fn parse_task_row(line: &str) -> Result<TaskSnapshot, RowError> {
    if !line.starts_with(TASK_ROW_PREFIX) {
        return Err(RowError::NotATaskRow);
    }

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < TASK_ROW_MIN_FIELDS {
        return Err(RowError::TooFewFields {
            expected: TASK_ROW_MIN_FIELDS,
            found: fields.len(),
        });
    }

    let pid = parse_field(&fields, 2)?;
    let io = parse_counters(&fields, 3)?;
    Ok(TaskSnapshot {
        pid,
        comm: fields[1].to_string(),
        io,
    })
}

/// Parses a complete stream into a snapshot.
///
/// Malformed rows are logged and skipped; the remaining rows are still
/// processed. Each uid gets its numeric id as a provisional name.
pub fn parse_uid_io_stats(content: &str) -> ParsedStats {
    let mut parsed = ParsedStats::default();
    let mut current_uid: Option<u32> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(TASK_ROW_PREFIX) {
            let task = match parse_task_row(line) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Invalid I/O stats: \"{}\" ({})", line, e);
                    parsed.malformed_rows += 1;
                    continue;
                }
            };

            let owner = current_uid.and_then(|uid| parsed.uids.get_mut(&uid));
            match owner {
                Some(snapshot) => {
                    snapshot.tasks.insert(task.pid, task);
                }
                None => {
                    debug!(
                        "Task row for pid {} ({}) precedes any uid row, skipping",
                        task.pid, task.comm
                    );
                    parsed.orphan_tasks += 1;
                }
            }
        } else {
            match parse_uid_row(line) {
                Ok((uid, io)) => {
                    parsed.uids.insert(uid, UidSnapshot::new(uid, io));
                    current_uid = Some(uid);
                }
                Err(e) => {
                    warn!("Invalid I/O stats: \"{}\" ({})", line, e);
                    parsed.malformed_rows += 1;
                }
            }
        }
    }

    parsed
}
