//! CLI arguments and subcommands for uid-io-monitor.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;
use uid_io_monitor::ChargerState;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for dumped history
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DumpFormat {
    Text,
    Json,
    Yaml,
}

/// Charger state as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ChargerArg {
    On,
    Off,
}

impl From<ChargerArg> for ChargerState {
    fn from(arg: ChargerArg) -> Self {
        match arg {
            ChargerArg::On => ChargerState::On,
            ChargerArg::Off => ChargerState::Off,
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "uid-io-monitor",
    about = "Per-UID storage I/O accounting monitor",
    long_about = "Per-UID storage I/O accounting monitor.\n\n\
                  Samples the kernel's cumulative per-uid and per-task I/O counters, \
                  attributes interval deltas to on-charger or on-battery use, and keeps \
                  a bounded, queryable history of per-uid usage.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Path of the per-uid I/O statistics file
    #[arg(long)]
    pub stats_path: Option<PathBuf>,

    /// Path of the passwd file used to name uids
    #[arg(long)]
    pub passwd_path: Option<PathBuf>,

    /// Seconds between periodic report cycles
    #[arg(long)]
    pub report_interval: Option<u64>,

    /// Charger state assumed at startup
    #[arg(long, value_enum)]
    pub charger: Option<ChargerArg>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and the statistics source
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments
        #[arg(long)]
        commented: bool,
    },

    /// Sample the statistics source in-process and print the recorded history
    Dump {
        /// Only show buckets from the last N hours (0 = all)
        #[arg(long, default_value_t = 0.0)]
        hours: f64,

        /// Only show uids with more than this many bytes in a bucket
        #[arg(long, default_value_t = 0)]
        threshold: u64,

        /// Number of report cycles to run before dumping
        #[arg(short = 'n', long, default_value_t = 1)]
        samples: usize,

        /// Milliseconds to wait between report cycles
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Flush the current interval before dumping
        #[arg(long)]
        force: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: DumpFormat,
    },

    /// Generate a synthetic per-uid I/O statistics file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "uid_io_stats.txt")]
        output: PathBuf,

        /// Number of uids to generate
        #[arg(long, default_value_t = 20)]
        uids: usize,

        /// Maximum number of tasks per uid
        #[arg(long, default_value_t = 4)]
        max_tasks: usize,

        /// Grow the counters of an existing file instead of starting over
        #[arg(long)]
        grow: bool,
    },
}
