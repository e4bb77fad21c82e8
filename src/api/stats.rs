//! Statistics endpoint

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use site_search::statistics::{self, Statistics};
use super::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Serialize)]
pub struct StatisticsPayload {
    pub statistics: Statistics,
}

/// GET /api/statistics
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatisticsPayload>>, ApiError> {
    let indexing = state.indexing.is_indexing().await;
    let statistics = statistics::collect(&state.repo, indexing).await?;
    Ok(Json(ApiResponse::success(StatisticsPayload { statistics })))
}
