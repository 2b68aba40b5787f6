use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use thermosync_api::Reading;

use crate::control::ControlHandle;
use crate::errors::ApiError;

const MAX_HISTORY_HOURS: u32 = 168;

#[derive(Clone)]
pub struct ReadingState {
    pub control: ControlHandle,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u32>,
}

pub fn reading_router(reading_state: ReadingState) -> Router {
    Router::new()
        .route("/readings", get(get_readings))
        .route("/readings/latest", get(get_latest_reading))
        .with_state(reading_state)
}

pub async fn get_latest_reading(
    State(state): State<ReadingState>,
) -> Result<Json<Reading>, ApiError> {
    state
        .control
        .latest_reading()
        .map(Json)
        .ok_or(ApiError::NoReading)
}

/// Readings from the last `hours` (default 24), oldest first.
pub async fn get_readings(
    State(state): State<ReadingState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let hours = query.hours.unwrap_or(24);
    if !(1..=MAX_HISTORY_HOURS).contains(&hours) {
        return Err(ApiError::InvalidRequest(format!(
            "hours must be between 1 and {MAX_HISTORY_HOURS}"
        )));
    }

    Ok(Json(state.control.readings(hours)))
}
