use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use thermosync_api::AdjustmentRecord;

use crate::control::{ADJUSTMENT_HISTORY_LIMIT, ControlHandle};
use crate::errors::ApiError;

#[derive(Clone)]
pub struct AdjustmentState {
    pub control: ControlHandle,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentQuery {
    pub limit: Option<usize>,
}

pub fn adjustment_router(adjustment_state: AdjustmentState) -> Router {
    Router::new()
        .route("/adjustments", get(get_adjustments))
        .with_state(adjustment_state)
}

/// Most recent adjustments first, 10 unless `limit` says otherwise.
pub async fn get_adjustments(
    State(state): State<AdjustmentState>,
    Query(query): Query<AdjustmentQuery>,
) -> Result<Json<Vec<AdjustmentRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(10);
    if !(1..=ADJUSTMENT_HISTORY_LIMIT).contains(&limit) {
        return Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {ADJUSTMENT_HISTORY_LIMIT}"
        )));
    }

    Ok(Json(state.control.adjustment_history(limit)))
}
