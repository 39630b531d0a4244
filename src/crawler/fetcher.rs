//! Page fetching / 页面抓取
use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use url::Url;

use crate::config::IndexingConfig;
use crate::error::FetchError;

/// A 2xx response body / 成功抓取的页面
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Fetch one page; non-2xx answers are errors / 页面抓取接口
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// reqwest-backed fetcher with a fixed timeout, user agent and referrer
pub struct HttpFetcher {
    client: Client,
    referrer: String,
}

impl HttpFetcher {
    pub fn new(config: &IndexingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout())
            .redirect(redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            referrer: config.referrer.clone(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let http_error = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let mut request = self.client.get(url.clone());
        if !self.referrer.is_empty() {
            request = request.header(header::REFERER, &self.referrer);
        }
        let response = request.send().await.map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(http_error)?;
        Ok(FetchedPage {
            url: url.clone(),
            status: status.as_u16(),
            body,
        })
    }
}
