//! Configuration types for the uid I/O monitor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::io_usage::ChargerState;
use crate::records::{DEFAULT_RETENTION_SECONDS, MAX_UID_RECORDS_SIZE};
use crate::uid_names::PASSWD_PATH;
use crate::uid_stats::UID_IO_STATS_PATH;

/// Monitor configuration.
///
/// Every field has a serde default so partial config files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Kernel per-uid statistics stream (default: /proc/uid_io/stats)
    #[serde(default = "default_stats_path")]
    pub stats_path: PathBuf,

    /// User database used to name uids (default: /etc/passwd)
    #[serde(default = "default_passwd_path")]
    pub passwd_path: PathBuf,

    /// Seconds between periodic report cycles (default: 3600)
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,

    /// Buckets older than this are pruned (default: 5 days)
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,

    /// Maximum number of records kept across all buckets (default: 48000)
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Charger state assumed at startup (default: on)
    #[serde(default = "default_charger_state")]
    pub initial_charger_state: ChargerState,
}

fn default_stats_path() -> PathBuf {
    PathBuf::from(UID_IO_STATS_PATH)
}
fn default_passwd_path() -> PathBuf {
    PathBuf::from(PASSWD_PATH)
}
fn default_report_interval() -> u64 {
    3600
}
fn default_retention() -> u64 {
    DEFAULT_RETENTION_SECONDS
}
fn default_max_records() -> usize {
    MAX_UID_RECORDS_SIZE
}
fn default_charger_state() -> ChargerState {
    ChargerState::On
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stats_path: default_stats_path(),
            passwd_path: default_passwd_path(),
            report_interval_seconds: default_report_interval(),
            retention_seconds: default_retention(),
            max_records: default_max_records(),
            initial_charger_state: default_charger_state(),
        }
    }
}

impl MonitorConfig {
    /// Checks values that would make the monitor useless.
    pub fn validate(&self) -> Result<(), String> {
        if self.report_interval_seconds == 0 {
            return Err("report_interval_seconds must be greater than 0".into());
        }
        if self.retention_seconds == 0 {
            return Err("retention_seconds must be greater than 0".into());
        }
        if self.max_records == 0 {
            return Err("max_records must be greater than 0".into());
        }
        if self.stats_path.as_os_str().is_empty() {
            return Err("stats_path must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();
        assert_eq!(config.stats_path, PathBuf::from("/proc/uid_io/stats"));
        assert_eq!(config.retention_seconds, 432_000);
        assert_eq!(config.max_records, 48_000);
        assert_eq!(config.initial_charger_state, ChargerState::On);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: MonitorConfig =
            serde_yaml::from_str("report_interval_seconds: 60\ninitial_charger_state: off\n")
                .expect("valid yaml");
        assert_eq!(config.report_interval_seconds, 60);
        assert_eq!(config.initial_charger_state, ChargerState::Off);
        assert_eq!(config.max_records, 48_000);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = MonitorConfig {
            max_records: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MonitorConfig {
            report_interval_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
