use axum::{
    extract::{Form, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexPageQuery {
    #[serde(default)]
    pub url: String,
}

/// GET /api/startIndexing
pub async fn start_indexing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.indexing.start_indexing().await?;
    Ok(Json(ApiResponse::ok()))
}

/// GET /api/stopIndexing
pub async fn stop_indexing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.indexing.stop_indexing().await?;
    Ok(Json(ApiResponse::ok()))
}

/// A form body wins over the query string when both carry a url
fn requested_url(query: IndexPageQuery, form: Option<IndexPageQuery>) -> String {
    match form {
        Some(form) if !form.url.trim().is_empty() => form.url.trim().to_string(),
        _ => query.url.trim().to_string(),
    }
}

/// POST /api/indexPage, url in the query string or a form-urlencoded body
pub async fn index_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexPageQuery>,
    form: Option<Form<IndexPageQuery>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let url = requested_url(query, form.map(|Form(f)| f));
    state.indexing.index_single_page(&url).await?;
    Ok(Json(ApiResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str) -> IndexPageQuery {
        IndexPageQuery { url: url.to_string() }
    }

    #[test]
    fn test_requested_url_from_form_or_query() {
        assert_eq!(requested_url(page(""), Some(page(" https://site.ru/a "))), "https://site.ru/a");
        assert_eq!(requested_url(page("https://site.ru/b"), None), "https://site.ru/b");
        assert_eq!(requested_url(page("https://site.ru/b"), Some(page(""))), "https://site.ru/b");
    }
}
