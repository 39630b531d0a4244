use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use sitesearch::models::{SearchResult, Statistics};

/// `{result, error?}` envelope / 通用响应
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn success() -> Self {
        Self {
            result: true,
            error: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            result: false,
            error: Some(message.to_string()),
        }
    }
}

pub type ApiError = (StatusCode, Json<ApiResponse>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

#[derive(Debug, Deserialize)]
pub struct IndexPageRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub site: Option<String>,
    #[serde(default)]
    pub offset: usize,
    /// 0 = configured default / 0 表示使用默认值
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub result: bool,
    pub count: usize,
    pub data: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub result: bool,
    pub statistics: Statistics,
}
