//! Configuration management for uid-io-monitor.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uid_io_monitor::MonitorConfig;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9216;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Feature flags
    pub enable_health: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // Monitor
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            enable_health: Some(true),
            log_level: Some("info".into()),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    cfg.monitor.validate()?;

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    if cfg.port == Some(0) {
        return Err("port must be greater than 0".into());
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if args.disable_health {
        config.enable_health = Some(false);
    }

    // Monitor settings: CLI wins if provided
    if let Some(path) = &args.stats_path {
        config.monitor.stats_path = path.clone();
    }
    if let Some(path) = &args.passwd_path {
        config.monitor.passwd_path = path.clone();
    }
    if let Some(secs) = args.report_interval {
        config.monitor.report_interval_seconds = secs;
    }
    if let Some(charger) = args.charger {
        config.monitor.initial_charger_state = charger.into();
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/uid-io-monitor/config.yaml",
                "/etc/uid-io-monitor/config.yml",
                "/etc/uid-io-monitor/config.json",
                "./uid-io-monitor.yaml",
                "./uid-io-monitor.yml",
                "./uid-io-monitor.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::Builder;
    use uid_io_monitor::ChargerState;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_effective_config(&config).is_ok());
        assert_eq!(config.monitor.max_records, 48_000);
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let config = Config {
            bind: Some("not-an-ip".into()),
            ..Default::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_load_yaml_with_partial_monitor_section() {
        let mut file = Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(
            file,
            "port: 9999\nmonitor:\n  stats_path: /tmp/stats\n  report_interval_seconds: 120\n"
        )
        .expect("write config");

        let config = load_config(Some(file.path())).expect("valid config");
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.monitor.stats_path, PathBuf::from("/tmp/stats"));
        assert_eq!(config.monitor.report_interval_seconds, 120);
        assert_eq!(config.monitor.retention_seconds, 432_000);
    }

    #[test]
    fn test_load_json() {
        let mut file = Builder::new().suffix(".json").tempfile().expect("temp file");
        writeln!(file, r#"{{"port": 1234, "monitor": {{"max_records": 10}}}}"#).expect("write");

        let config = load_config(Some(file.path())).expect("valid config");
        assert_eq!(config.port, Some(1234));
        assert_eq!(config.monitor.max_records, 10);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/uid-io-monitor.yaml"))).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "uid-io-monitor",
            "--no-config",
            "--port",
            "7000",
            "--stats-path",
            "/tmp/custom",
            "--report-interval",
            "30",
            "--charger",
            "off",
            "--disable-health",
        ]);
        let config = resolve_config(&args).expect("resolved");
        assert_eq!(config.port, Some(7000));
        assert_eq!(config.monitor.stats_path, PathBuf::from("/tmp/custom"));
        assert_eq!(config.monitor.report_interval_seconds, 30);
        assert_eq!(config.monitor.initial_charger_state, ChargerState::Off);
        assert_eq!(config.enable_health, Some(false));
    }

    #[test]
    fn test_render_config_roundtrips_through_toml() {
        let config = Config::default();
        let rendered = render_config(&config, ConfigFormat::Toml).expect("render toml");
        let parsed: Config = toml::from_str(&rendered).expect("parse toml");
        assert_eq!(parsed.monitor, config.monitor);
    }
}
