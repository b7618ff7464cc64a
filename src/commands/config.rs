//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("uid-io-monitor.yaml"),
    };

    let mut content = render_config(&config, format.clone())?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# UID I/O Monitor Configuration
# =============================
#
# Server Configuration
# --------------------
# bind: "127.0.0.1"            # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Monitor
# -------
# monitor:
#   stats_path: /proc/uid_io/stats   # Cumulative per-uid and per-task I/O counters
#   passwd_path: /etc/passwd         # Source of uid names (uids without one keep their number)
#   report_interval_seconds: 3600    # Seconds between report cycles (one bucket each)
#   retention_seconds: 432000        # Buckets older than this are pruned (5 days)
#   max_records: 48000               # Cap on stored per-uid records across all buckets
#   initial_charger_state: on        # on or off, until POST /charger says otherwise
"#;

    format!("{comments}\n{yaml}")
}
