//! Indexing admin endpoints / 索引管理接口
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use sitesearch::error::{FetchError, IndexingError};

use super::types::*;
use crate::state::AppState;

pub async fn start_indexing(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, ApiError> {
    state.indexing.start_indexing().map_err(indexing_error)?;
    Ok(Json(ApiResponse::success()))
}

pub async fn stop_indexing(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, ApiError> {
    state.indexing.stop_indexing().map_err(indexing_error)?;
    Ok(Json(ApiResponse::success()))
}

/// Accepts `url` as a form field or a JSON body / 支持表单或 JSON
pub async fn index_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let url = page_url_from(&headers, &body)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing field: url"))?;

    state.indexing.try_index_page(&url).await.map_err(indexing_error)?;
    Ok(Json(ApiResponse::success()))
}

pub async fn statistics(State(state): State<Arc<AppState>>) -> Result<Json<StatisticsResponse>, ApiError> {
    let statistics = state.indexing.statistics().await.map_err(|e| {
        tracing::error!("Failed to load statistics: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
    })?;
    Ok(Json(StatisticsResponse {
        result: true,
        statistics,
    }))
}

fn page_url_from(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    let url = if is_json {
        serde_json::from_slice::<IndexPageRequest>(body).ok()?.url
    } else {
        url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.into_owned())?
    };

    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

fn indexing_error(e: IndexingError) -> ApiError {
    let status = match &e {
        IndexingError::AlreadyRunning => StatusCode::CONFLICT,
        IndexingError::Fetch(FetchError::MalformedUrl { .. }) => StatusCode::BAD_REQUEST,
        IndexingError::Fetch(_) => StatusCode::BAD_GATEWAY,
        _ if e.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Indexing request failed: {}", e);
    }
    api_error(status, &e.to_string())
}
