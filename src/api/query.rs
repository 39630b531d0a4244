use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::types::*;
use crate::state::AppState;

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let data = state
        .search
        .search(&params.query, params.site.as_deref(), params.offset, params.limit)
        .await
        .map_err(|e| {
            if e.is_validation() {
                api_error(StatusCode::BAD_REQUEST, &e.to_string())
            } else {
                tracing::error!("Search for {:?} failed: {}", params.query, e);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        })?;

    Ok(Json(SearchResponse {
        result: true,
        count: data.len(),
        data,
    }))
}
