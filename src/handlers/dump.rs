//! Dump endpoint handler.
//!
//! `GET /dump?hours=&threshold=&force=&format=` returns the recorded per-uid
//! history. `hours=0` (the default) returns everything that is stored.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::render::render_history_text;
use crate::state::SharedState;

/// Query parameters for the dump endpoint.
#[derive(Deserialize, Debug, Default)]
pub struct DumpQuery {
    pub hours: Option<f64>,
    pub threshold: Option<u64>,
    pub force: Option<bool>,
    pub format: Option<String>,
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        [("Content-Type", "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}

/// Handler for the /dump endpoint.
#[instrument(skip(state))]
pub async fn dump_handler(
    State(state): State<SharedState>,
    Query(query): Query<DumpQuery>,
) -> Response {
    let hours = query.hours.unwrap_or(0.0);
    if !hours.is_finite() || hours < 0.0 {
        return bad_request(format!("hours must be a non-negative number, got {}", hours));
    }
    let threshold = query.threshold.unwrap_or(0);
    let force = query.force.unwrap_or(false);
    let as_json = match query.format.as_deref() {
        None | Some("text") => false,
        Some("json") => true,
        Some(other) => return bad_request(format!("unknown format '{}', use text or json", other)),
    };

    debug!(
        "Processing /dump request: hours={}, threshold={}, force={}",
        hours, threshold, force
    );

    // A forced dump runs a full report cycle under the monitor lock.
    let monitor = state.monitor.clone();
    let history = match tokio::task::spawn_blocking(move || monitor.dump(hours, threshold, force)).await {
        Ok(history) => history,
        Err(e) => {
            error!("Dump task failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Dump failed").into_response();
        }
    };

    if as_json {
        match serde_json::to_string_pretty(&history) {
            Ok(body) => (
                StatusCode::OK,
                [("Content-Type", "application/json")],
                body,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to serialize dump: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize dump").into_response()
            }
        }
    } else {
        (
            StatusCode::OK,
            [("Content-Type", "text/plain; charset=utf-8")],
            render_history_text(&history),
        )
            .into_response()
    }
}
