use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use site_search::search::{SearchOptions, SearchResults};
use crate::api::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub offset: usize,
    /// 0 selects the configured default page size
    #[serde(default)]
    pub limit: usize,
}

/// GET /api/search?query=&site=&offset=&limit=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(req): Query<SearchRequest>,
) -> Result<Json<ApiResponse<SearchResults>>, ApiError> {
    let mut options = SearchOptions::new(req.query)
        .with_offset(req.offset)
        .with_limit(req.limit);
    if let Some(site) = req.site {
        options = options.with_site(site);
    }

    let results = state.search.search(&options).await?;
    Ok(Json(ApiResponse::success(results)))
}
