//! Landing page for `/`.
//!
//! Shows the monitor's current state at a glance (charger, last report,
//! record store fill and the heaviest uids of the newest bucket) followed by
//! links to the other endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::fmt::Write as FmtWrite;
use tracing::{debug, error, instrument};
use uid_io_monitor::{ChargerState, StoreSummary, TimeBucket};

use crate::handlers::health::FOOTER_TEXT;
use crate::render::{format_bytes, format_ts};
use crate::state::SharedState;

/// Number of uids listed from the newest bucket.
const TOP_UIDS: usize = 5;

const STYLE: &str = "\
body { font-family: sans-serif; max-width: 760px; margin: 2em auto; color: #333; }
h1 { border-bottom: 2px solid #007bff; padding-bottom: 8px; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1.5em; }
th, td { text-align: left; padding: 4px 8px; border-bottom: 1px solid #ddd; }
td.num { text-align: right; font-family: monospace; }
.footer { color: #666; font-size: 0.9em; margin-top: 2em; }";

/// Everything the page shows, gathered in one pass over the monitor.
struct LandingView {
    uptime_secs: u64,
    charger: ChargerState,
    interval_secs: u64,
    last_report_secs: Option<u64>,
    summary: StoreSummary,
    latest: Option<(u64, TimeBucket)>,
    health_enabled: bool,
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing / request");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let interval_secs = state.config.monitor.report_interval_seconds;
    let health_enabled = state.config.enable_health.unwrap_or(true);
    let monitor = state.monitor.clone();

    let view = tokio::task::spawn_blocking(move || LandingView {
        uptime_secs,
        charger: monitor.charger_state(),
        interval_secs,
        last_report_secs: monitor.stats().seconds_since_last_report(),
        summary: monitor.store_summary(),
        latest: monitor.latest_bucket(),
        health_enabled,
    })
    .await;

    match view {
        Ok(view) => Html(render_landing_page(&view)).into_response(),
        Err(e) => {
            error!("Landing page task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Monitor unavailable\n").into_response()
        }
    }
}

fn render_landing_page(view: &LandingView) -> String {
    let mut out = String::new();
    writeln!(out, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>").ok();
    writeln!(out, "<meta charset=\"UTF-8\">\n<title>UID I/O Monitor</title>").ok();
    writeln!(out, "<style>\n{}\n</style>\n</head>\n<body>", STYLE).ok();
    writeln!(out, "<h1>UID I/O Monitor</h1>").ok();

    let last_report = match view.last_report_secs {
        Some(secs) => format!("{}s ago", secs),
        None => "none yet".to_string(),
    };
    let s = &view.summary;
    let status_rows = [
        ("Charger", view.charger.to_string()),
        ("Uptime", format_uptime(view.uptime_secs)),
        ("Report interval", format!("{}s", view.interval_secs)),
        ("Last report", last_report),
        ("Buckets", s.buckets.to_string()),
        ("Records", format!("{} of {}", s.records, s.max_records)),
        ("Retention", format!("{}h", s.retention_seconds / 3600)),
        ("Oldest bucket", s.oldest_ts.map_or_else(|| "-".into(), format_ts)),
        ("Newest bucket", s.newest_ts.map_or_else(|| "-".into(), format_ts)),
    ];
    writeln!(out, "<table>").ok();
    for (label, value) in status_rows {
        writeln!(out, "<tr><th>{}</th><td>{}</td></tr>", label, value).ok();
    }
    writeln!(out, "</table>").ok();

    writeln!(out, "<h2>Newest bucket</h2>").ok();
    match &view.latest {
        Some((ts, bucket)) => {
            writeln!(
                out,
                "<p>{} .. {}, {} uids</p>",
                format_ts(bucket.start_ts),
                format_ts(*ts),
                bucket.len()
            )
            .ok();
            let mut records: Vec<_> = bucket.entries.iter().collect();
            records.sort_by(|a, b| b.total_bytes().cmp(&a.total_bytes()));

            writeln!(out, "<table>\n<tr><th>uid</th><th>total</th><th>tasks</th></tr>").ok();
            for record in records.into_iter().take(TOP_UIDS) {
                writeln!(
                    out,
                    "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
                    escape_html(&record.name),
                    format_bytes(record.total_bytes()),
                    record.task_ios.len()
                )
                .ok();
            }
            writeln!(out, "</table>").ok();
        }
        None => {
            writeln!(out, "<p>No bucket recorded yet.</p>").ok();
        }
    }

    writeln!(out, "<h2>Endpoints</h2>\n<ul>").ok();
    writeln!(out, "<li><a href=\"/metrics\">/metrics</a> Prometheus metrics</li>").ok();
    if view.health_enabled {
        writeln!(out, "<li><a href=\"/health\">/health</a> monitor statistics</li>").ok();
    }
    writeln!(
        out,
        "<li><a href=\"/dump\">/dump</a> history, <code>?hours=&amp;threshold=&amp;force=&amp;format=text|json</code></li>"
    )
    .ok();
    writeln!(
        out,
        "<li><a href=\"/charger\">/charger</a> charger state, <code>POST ?state=on|off</code> to switch</li>"
    )
    .ok();
    writeln!(out, "</ul>").ok();

    writeln!(out, "<p class=\"footer\">{}</p>\n</body>\n</html>", FOOTER_TEXT).ok();
    out
}

fn format_uptime(secs: u64) -> String {
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Uid names come from the user database, so they are escaped.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
