use axum::extract::{Query, State};
use axum::Json;
use std::sync::Arc;

use super::{ApiResponse, ApiResult};
use crate::state::AppState;
use sitesearch_backend::search::{SearchQuery, SearchResults};

/// GET /api/search?query=&site=&offset=&limit=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(request): Query<SearchQuery>,
) -> ApiResult<SearchResults> {
    let results = state.query.search(&request).await?;
    Ok(Json(ApiResponse::success(results)))
}
