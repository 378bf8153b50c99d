pub mod indexing;
pub mod search;
pub mod stats;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use sitesearch_backend::SearchError;

/// `{result, error?, ...data}` response body / 统一响应体
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            result: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            result: false,
            error: Some(message.to_string()),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            result: true,
            error: None,
            data: None,
        }
    }
}

/// Error response with its HTTP status / 带状态码的错误响应
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::EmptyQuery | SearchError::InvalidUrl(_) => {
                Self::new(StatusCode::BAD_REQUEST, &e.to_string())
            }
            SearchError::OutsideConfiguredSites(_) => {
                Self::new(StatusCode::NOT_FOUND, "page is outside the configured sites")
            }
            SearchError::AlreadyIndexing => Self::new(StatusCode::METHOD_NOT_ALLOWED, &e.to_string()),
            _ => {
                tracing::error!("Request failed: {}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(&self.message))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Build the API router / 构建路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/statistics", get(stats::statistics))
        .route("/api/startIndexing", get(indexing::start_indexing))
        .route("/api/stopIndexing", get(indexing::stop_indexing))
        .route("/api/indexPage", get(indexing::index_page).post(indexing::index_page))
        .route("/api/search", get(search::search))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
