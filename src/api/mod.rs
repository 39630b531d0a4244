pub mod indexing;
pub mod query;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::state::AppState;

/// REST routes over the indexing and search services / 路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/startIndexing", get(indexing::start_indexing))
        .route("/api/stopIndexing", get(indexing::stop_indexing))
        .route("/api/indexPage", post(indexing::index_page))
        .route("/api/statistics", get(indexing::statistics))
        .route("/api/search", get(query::search))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;
    use url::Url;

    use sitesearch::config::{AppConfig, SiteConfig};
    use sitesearch::crawler::{FetchedPage, PageFetcher};
    use sitesearch::error::FetchError;
    use sitesearch::indexing::IndexingPipeline;
    use sitesearch::lemmatizer::{Lemmatizer, SnowballLemmatizer};
    use sitesearch::store::IndexStore;

    struct OfflineFetcher;

    #[async_trait]
    impl PageFetcher for OfflineFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    async fn setup(sites: Vec<SiteConfig>) -> (Router, IndexStore, Arc<dyn Lemmatizer>) {
        let store = IndexStore::in_memory().await.unwrap();
        let lemmatizer: Arc<dyn Lemmatizer> = Arc::new(SnowballLemmatizer::new());
        let mut config = AppConfig::default();
        config.indexing.sites = sites;
        let state = AppState::new(store.clone(), &config, Arc::new(OfflineFetcher), lemmatizer.clone());
        (router(Arc::new(state)), store, lemmatizer)
    }

    fn example_site() -> Vec<SiteConfig> {
        vec![SiteConfig {
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
        }]
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_blank_search_is_bad_request() {
        let (app, _, _) = setup(example_site()).await;
        let (status, body) = call(&app, get("/api/search?query=%20%20")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"], false);
        assert_eq!(body["error"], "Empty search query");

        let (status, _) = call(&app, get("/api/search")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_returns_ranked_pages() {
        let (app, store, lemmatizer) = setup(example_site()).await;
        let pipeline = IndexingPipeline::new(store.clone(), lemmatizer, &AppConfig::default().indexing);
        let site = store.reset_site("https://example.com", "Example").await.unwrap();
        pipeline
            .index(&site, &Url::parse("https://example.com/cats").unwrap(), "<title>Cats</title><p>a cat</p>")
            .await
            .unwrap();

        let (status, body) = call(&app, get("/api/search?query=cat&site=https://example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["pageUrl"], "https://example.com/cats");
        assert_eq!(body["data"][0]["siteName"], "Example");

        let (status, body) = call(&app, get("/api/search?query=cat&site=https://nowhere.example")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"], false);
    }

    #[tokio::test]
    async fn test_indexing_guards() {
        let (app, _, _) = setup(Vec::new()).await;

        let (status, body) = call(&app, get("/api/stopIndexing")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"], false);

        let (status, body) = call(&app, get("/api/startIndexing")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No sites configured for indexing");
    }

    #[tokio::test]
    async fn test_index_page_and_statistics() {
        let (app, _, _) = setup(example_site()).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/indexPage")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("url=https%3A%2F%2Fnot-allowed.example%2Fx"))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["result"], false);

        let request = Request::builder()
            .method("POST")
            .uri("/api/indexPage")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"link": "https://example.com"}"#))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing field: url");

        let request = Request::builder()
            .method("POST")
            .uri("/api/indexPage")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"url": "https://example.com/missing"}"#))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["result"], false);

        let (status, body) = call(&app, get("/api/statistics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["statistics"]["total"]["sites"], 2);
        assert_eq!(body["statistics"]["total"]["indexing"], false);
        let statuses: Vec<_> = body["statistics"]["detailed"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["status"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(statuses, vec!["FAILED", "FAILED"]);
    }
}
