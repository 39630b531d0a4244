//! Error types / 错误类型

use thiserror::Error;

/// Rank value outside [0, 1] / 权重越界
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("rank value {0} is outside [0, 1]")]
pub struct InvalidRank(pub f32);

/// Page fetch failure; always page-level, never fatal for a site / 页面抓取失败
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("malformed url {url}: {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failures of the indexing lifecycle surface / 索引生命周期错误
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("Indexing is already running")]
    AlreadyRunning,
    #[error("Indexing is not running")]
    NotRunning,
    #[error("No sites configured for indexing")]
    NoSites,
    #[error("Page {0} is outside the configured sites")]
    PageNotAllowed(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),
}

impl IndexingError {
    /// Caller errors as opposed to runtime failures / 是否为调用方错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IndexingError::AlreadyRunning
                | IndexingError::NotRunning
                | IndexingError::NoSites
                | IndexingError::PageNotAllowed(_)
        )
    }
}

/// Search failures / 搜索错误
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Empty search query")]
    EmptyQuery,
    #[error("Site {0} is not indexed")]
    UnknownSite(String),
    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),
}

impl SearchError {
    /// Validation errors are the caller's fault / 是否为参数校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, SearchError::EmptyQuery | SearchError::UnknownSite(_))
    }
}

/// Page write unit failure / 页面写入失败
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Rank(#[from] InvalidRank),
    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),
}
