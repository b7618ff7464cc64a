//! Charger state endpoint handlers.
//!
//! `GET /charger` reports the charger state usage is currently attributed to.
//! `POST /charger?state=on|off` switches it; usage accrued so far is first
//! attributed to the previous state.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info, instrument};
use uid_io_monitor::ChargerState;

use crate::state::SharedState;

/// Query parameters for the charger endpoint.
#[derive(Deserialize, Debug)]
pub struct ChargerQuery {
    pub state: String,
}

/// Handler for `GET /charger`.
#[instrument(skip(state))]
pub async fn charger_get_handler(State(state): State<SharedState>) -> impl IntoResponse {
    format!("charger: {}\n", state.monitor.charger_state())
}

/// Handler for `POST /charger`.
#[instrument(skip(state))]
pub async fn charger_set_handler(
    State(state): State<SharedState>,
    Query(query): Query<ChargerQuery>,
) -> Response {
    let requested: ChargerState = match query.state.parse() {
        Ok(s) => s,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("{}\n", e)).into_response(),
    };

    let monitor = state.monitor.clone();
    let result = tokio::task::spawn_blocking(move || monitor.set_charger_state(requested)).await;

    match result {
        Ok(previous) => {
            if previous != requested {
                info!("Charger state changed: {} -> {}", previous, requested);
            }
            (StatusCode::OK, format!("charger: {}\n", requested)).into_response()
        }
        Err(e) => {
            error!("Charger update task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Charger update failed\n").into_response()
        }
    }
}
