use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;
use sitesearch_backend::SearchError;

#[derive(Debug, Deserialize)]
pub struct IndexPageParams {
    #[serde(default)]
    pub url: String,
}

/// GET /api/startIndexing
pub async fn start_indexing(State(state): State<Arc<AppState>>) -> ApiResult<()> {
    state.indexing.start_indexing()?;
    Ok(Json(ApiResponse::ok()))
}

/// GET /api/stopIndexing
pub async fn stop_indexing(State(state): State<Arc<AppState>>) -> ApiResult<()> {
    if !state.indexing.stop_indexing().await? {
        return Err(ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "indexing is not running"));
    }
    Ok(Json(ApiResponse::ok()))
}

/// GET|POST /api/indexPage?url=
pub async fn index_page(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IndexPageParams>,
) -> ApiResult<()> {
    let url = params.url.trim();
    if !state.indexing.is_link_from_config(url) {
        return Err(SearchError::OutsideConfiguredSites(url.to_string()).into());
    }
    state.indexing.index_one_page(url).await?;
    Ok(Json(ApiResponse::ok()))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, call};
    use axum::http::Method;

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(&dir).await;

        let (status, body) = call(&app, Method::GET, "/api/stopIndexing").await;
        assert_eq!(status, 405);
        assert_eq!(body["error"], "indexing is not running");

        let (status, body) = call(&app, Method::GET, "/api/startIndexing").await;
        assert_eq!(status, 200);
        assert_eq!(body["result"], true);

        let (status, body) = call(&app, Method::GET, "/api/startIndexing").await;
        assert_eq!(status, 405);
        assert_eq!(body["result"], false);
        assert_eq!(body["error"], "indexing is already running");

        let (status, _) = call(&app, Method::GET, "/api/stopIndexing").await;
        assert_eq!(status, 200);
        assert!(!state.indexing.is_indexing());
        state.indexing.wait_idle().await;
    }

    #[tokio::test]
    async fn test_index_page_outside_sites() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, app) = app(&dir).await;

        for method in [Method::GET, Method::POST] {
            let (status, body) =
                call(&app, method, "/api/indexPage?url=https://elsewhere.example/page").await;
            assert_eq!(status, 404);
            assert_eq!(body["result"], false);
            assert_eq!(body["error"], "page is outside the configured sites");
        }

        let (status, _) = call(&app, Method::GET, "/api/indexPage").await;
        assert_eq!(status, 404);
    }
}
