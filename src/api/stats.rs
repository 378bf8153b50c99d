use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::{ApiResponse, ApiResult};
use crate::state::AppState;
use sitesearch_backend::statistics::{collect_statistics, StatisticsData};

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub statistics: StatisticsData,
}

/// GET /api/statistics
pub async fn statistics(State(state): State<Arc<AppState>>) -> ApiResult<StatisticsResponse> {
    let statistics = collect_statistics(
        state.store.as_ref(),
        state.indexing.sites(),
        state.indexing.is_indexing(),
    )
    .await?;
    Ok(Json(ApiResponse::success(StatisticsResponse { statistics })))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, call};
    use axum::http::Method;

    #[tokio::test]
    async fn test_statistics_before_indexing() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, app) = app(&dir).await;

        let (status, body) = call(&app, Method::GET, "/api/statistics").await;
        assert_eq!(status, 200);
        assert_eq!(body["result"], true);
        assert_eq!(body["statistics"]["total"]["sites"], 1);
        assert_eq!(body["statistics"]["total"]["pages"], 0);
        assert_eq!(body["statistics"]["total"]["indexing"], false);
        assert_eq!(body["statistics"]["detailed"].as_array().unwrap().len(), 0);
    }
}
