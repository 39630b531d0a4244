use std::sync::Arc;

use sitesearch::config::AppConfig;
use sitesearch::crawler::PageFetcher;
use sitesearch::indexing::IndexingService;
use sitesearch::lemmatizer::Lemmatizer;
use sitesearch::search::SearchEngine;
use sitesearch::store::IndexStore;

/// Shared by every handler / 处理器共享状态
pub struct AppState {
    pub indexing: IndexingService,
    pub search: SearchEngine,
}

impl AppState {
    pub fn new(
        store: IndexStore,
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        lemmatizer: Arc<dyn Lemmatizer>,
    ) -> Self {
        Self {
            indexing: IndexingService::new(store.clone(), config.indexing.clone(), fetcher, lemmatizer.clone()),
            search: SearchEngine::new(store, lemmatizer, config.search.clone()),
        }
    }
}
