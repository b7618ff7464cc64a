//! Startup requirement validation for uid-io-monitor.
//!
//! This module validates that the daemon can read the per-uid I/O statistics
//! source before it starts sampling.

use nix::unistd::geteuid;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uid_io_monitor::MonitorConfig;

/// Validate all runtime requirements
pub fn validate_requirements(config: &MonitorConfig) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_stats_access(&config.stats_path)?;
    check_passwd_access(&config.passwd_path);

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - the uid I/O statistics file is usually root-only");
        warn!("   Recommendation: Run as root or grant read access to the stats file");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// Check that the statistics source exists and can be read
fn check_stats_access(path: &Path) -> Result<(), ValidationError> {
    if !path.exists() {
        error!("❌ {} not found", path.display());
        error!("   The kernel does not expose per-uid I/O accounting here.");
        error!("   Use --stats-path to point at another source (see generate-testdata).");
        return Err(ValidationError::StatsSourceMissing(path.to_path_buf()));
    }

    match fs::read_to_string(path) {
        Ok(content) => {
            let rows = content.lines().filter(|l| !l.trim().is_empty()).count();
            info!("✅ {} readable ({} rows)", path.display(), rows);
            if rows == 0 {
                warn!("⚠️  {} is empty - nothing will be recorded until it fills", path.display());
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot read {} - insufficient permissions", path.display());
            error!("");
            error!("   Solutions:");
            error!("   1. Run as root");
            error!("   2. Grant read access to the statistics file");
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            error!("❌ Cannot read {}: {}", path.display(), e);
            Err(ValidationError::StatsSourceUnreadable(e.to_string()))
        }
    }
}

/// Check the passwd file used for uid names; missing names are not fatal
fn check_passwd_access(path: &Path) {
    match fs::metadata(path) {
        Ok(_) => debug!("passwd file {} available for uid names", path.display()),
        Err(e) => {
            warn!("⚠️  Cannot access {}: {}", path.display(), e);
            warn!("   Uids will be reported by number");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Statistics source not found at {}", .0.display())]
    StatsSourceMissing(PathBuf),

    #[error("Statistics source not readable: {0}")]
    StatsSourceUnreadable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_stats_source() {
        let config = MonitorConfig {
            stats_path: PathBuf::from("/nonexistent/uid_io/stats"),
            ..Default::default()
        };
        let err = validate_requirements(&config).unwrap_err();
        assert!(matches!(err, ValidationError::StatsSourceMissing(_)));
        assert!(err.to_string().contains("/nonexistent/uid_io/stats"));
    }

    #[test]
    fn test_readable_stats_source() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "1000 0 0 0 0 0 0 0 0 0 0").expect("write");
        let config = MonitorConfig {
            stats_path: file.path().to_path_buf(),
            passwd_path: PathBuf::from("/nonexistent/passwd"),
            ..Default::default()
        };
        assert!(validate_requirements(&config).is_ok());
    }
}
