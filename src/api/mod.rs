pub mod indexing;
pub mod search;
pub mod stats;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use site_search::indexer::IndexingError;
use site_search::search::SearchError;

/// `{"result": true, ...payload}` or `{"result": false, "error": "..."}`
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub result: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            result: true,
            data: None,
            error: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            result: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            result: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

/// Handler error rendered as a failed ApiResponse
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(&self.message))).into_response()
    }
}

impl From<IndexingError> for ApiError {
    fn from(e: IndexingError) -> Self {
        let status = match &e {
            IndexingError::AlreadyRunning | IndexingError::NotRunning => StatusCode::CONFLICT,
            IndexingError::OutOfScope | IndexingError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            IndexingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Indexing request failed: {}", e);
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        let status = match &e {
            SearchError::EmptyQuery => StatusCode::BAD_REQUEST,
            SearchError::SiteNotFound(_) => StatusCode::NOT_FOUND,
            SearchError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Search request failed: {}", e);
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", e);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Database error: {}", e),
        }
    }
}
