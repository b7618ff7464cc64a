//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! monitor statistics and record store status.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};
use uid_io_monitor::StoreSummary;

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!("uid-io-monitor ", env!("CARGO_PKG_VERSION"));

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let stats = state.monitor.stats();
    let interval = state.config.monitor.report_interval_seconds;

    // Overdue once two report intervals pass without a completed cycle.
    let samples_ok = stats.samples_ok.load(Ordering::Relaxed);
    let overdue = stats
        .seconds_since_last_report()
        .map(|secs| secs > interval.saturating_mul(2))
        .unwrap_or(false);

    let (status, message) = if samples_ok == 0 {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "No successful sample of the statistics source yet",
        )
    } else if overdue {
        (StatusCode::SERVICE_UNAVAILABLE, "Report cycles overdue")
    } else {
        (StatusCode::OK, "OK")
    };

    // Calculate uptime
    let uptime_seconds = stats.get_uptime_seconds();
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let table = stats.render_table();
    let store_section = render_store_summary(&state.monitor.store_summary());
    let charger = state.monitor.charger_state();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nCharger: {charger}\n\n{table}\n{store_section}\n{FOOTER_TEXT}"
        ),
    )
}

/// Renders record store information as a plain-text table.
fn render_store_summary(summary: &StoreSummary) -> String {
    let mut out = String::new();
    writeln!(out, "RECORD STORE").ok();
    writeln!(out, "============").ok();
    writeln!(out).ok();

    let usage = if summary.max_records == 0 {
        0.0
    } else {
        summary.records as f64 * 100.0 / summary.max_records as f64
    };
    let fmt_ts = |ts: Option<u64>| {
        ts.and_then(|t| chrono::DateTime::from_timestamp(t as i64, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    writeln!(out, "{:25} | {:>20}", "buckets", summary.buckets).ok();
    writeln!(
        out,
        "{:25} | {:>20}",
        "records",
        format!("{} / {} ({:.1}%)", summary.records, summary.max_records, usage)
    )
    .ok();
    writeln!(
        out,
        "{:25} | {:>20}",
        "retention",
        format!("{:.1} days", summary.retention_seconds as f64 / (SECONDS_PER_HOUR * HOURS_PER_DAY))
    )
    .ok();
    writeln!(out, "{:25} | {:>20}", "oldest bucket", fmt_ts(summary.oldest_ts)).ok();
    writeln!(out, "{:25} | {:>20}", "newest bucket", fmt_ts(summary.newest_ts)).ok();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_store_summary() {
        let summary = StoreSummary {
            buckets: 2,
            records: 12_000,
            max_records: 48_000,
            retention_seconds: 432_000,
            oldest_ts: Some(0),
            newest_ts: None,
        };
        let out = render_store_summary(&summary);
        assert!(out.contains("12000 / 48000 (25.0%)"));
        assert!(out.contains("5.0 days"));
        assert!(out.contains("1970-01-01 00:00:00 UTC"));
    }
}
