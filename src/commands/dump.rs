//! Dump command implementation.
//!
//! Runs the monitor in-process for a few report cycles against the configured
//! statistics source and prints the recorded history.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use uid_io_monitor::UidMonitor;

use crate::cli::DumpFormat;
use crate::config::Config;
use crate::render::render_history_text;

/// Options for the dump command.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub hours: f64,
    pub threshold: u64,
    pub samples: usize,
    pub interval_ms: u64,
    pub force: bool,
    pub format: DumpFormat,
}

/// Samples the statistics source `samples` times and prints the history.
pub fn command_dump(options: DumpOptions, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !options.hours.is_finite() || options.hours < 0.0 {
        return Err(format!("--hours must be a non-negative number, got {}", options.hours).into());
    }

    let monitor = UidMonitor::from_config(&config.monitor);
    if !monitor.init(config.monitor.initial_charger_state) {
        return Err(format!(
            "Cannot read statistics source {}",
            config.monitor.stats_path.display()
        )
        .into());
    }

    for i in 0..options.samples {
        thread::sleep(Duration::from_millis(options.interval_ms));
        monitor.report();
        debug!("Report cycle {}/{} done", i + 1, options.samples);
    }

    let history = monitor.dump(options.hours, options.threshold, options.force);

    let skipped = monitor.stats().skipped_reports.load(Ordering::Relaxed);
    if skipped > 0 {
        warn!("{} report cycles skipped because the source could not be read", skipped);
    }

    match options.format {
        DumpFormat::Text => print!("{}", render_history_text(&history)),
        DumpFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
        DumpFormat::Yaml => print!("{}", serde_yaml::to_string(&history)?),
    }
    Ok(())
}
