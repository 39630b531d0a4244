//! Site lifecycle manager / 站点索引生命周期管理
//!
//! One run = one `CrawlContext` shared by every seed site. Each site is crawled
//! and indexed concurrently; its status is finalized once both its crawl and
//! its pipeline have drained.

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use super::pipeline::IndexingPipeline;
use crate::config::{IndexingConfig, SiteConfig};
use crate::crawler::{CrawlContext, CrawlEngine, FetchedPage, PageFetcher};
use crate::error::{FetchError, IndexingError};
use crate::lemmatizer::Lemmatizer;
use crate::models::{SiteStatus, Statistics, TotalStatistics};
use crate::store::IndexStore;
use crate::text;

/// last_error of a site whose run was stopped / 用户停止时的错误信息
pub const STOPPED_BY_USER: &str = "Indexing stopped by user";

struct Inner {
    store: IndexStore,
    config: IndexingConfig,
    fetcher: Arc<dyn PageFetcher>,
    pipeline: IndexingPipeline,
    /// Sites of the current run that have not been finalized / 未完成的站点数
    active_sites: AtomicUsize,
}

struct ActiveRun {
    context: Arc<CrawlContext>,
    handle: Option<JoinHandle<()>>,
}

pub struct IndexingService {
    inner: Arc<Inner>,
    run: Mutex<Option<ActiveRun>>,
}

impl IndexingService {
    pub fn new(
        store: IndexStore,
        config: IndexingConfig,
        fetcher: Arc<dyn PageFetcher>,
        lemmatizer: Arc<dyn Lemmatizer>,
    ) -> Self {
        let pipeline = IndexingPipeline::new(store.clone(), lemmatizer, &config);
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                fetcher,
                pipeline,
                active_sites: AtomicUsize::new(0),
            }),
            run: Mutex::new(None),
        }
    }

    pub fn is_indexing_in_progress(&self) -> bool {
        self.inner.active_sites.load(Ordering::SeqCst) > 0
    }

    /// Start a full rebuild of every seed site in the background / 后台启动全量索引
    pub fn start_indexing(&self) -> Result<(), IndexingError> {
        let mut run = self.run.lock();
        if self.is_indexing_in_progress() {
            return Err(IndexingError::AlreadyRunning);
        }

        let seeds = self.inner.config.sites.clone();
        if seeds.is_empty() {
            return Err(IndexingError::NoSites);
        }

        let context = Arc::new(CrawlContext::new(self.inner.config.max_pages));
        self.inner.active_sites.store(seeds.len(), Ordering::SeqCst);
        tracing::info!("Indexing started for {} sites", seeds.len());

        let inner = self.inner.clone();
        let run_context = context.clone();
        let handle = tokio::spawn(async move {
            run_all_sites(inner, run_context, seeds).await;
        });

        *run = Some(ActiveRun {
            context,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Raise the stop signal of the current run / 停止当前索引
    pub fn stop_indexing(&self) -> Result<(), IndexingError> {
        let run = self.run.lock();
        match run.as_ref() {
            Some(active) if self.is_indexing_in_progress() => {
                active.context.stop();
                tracing::info!("Stop requested for the running indexing");
                Ok(())
            }
            _ => Err(IndexingError::NotRunning),
        }
    }

    /// Wait for the current run (if any) to finish / 等待当前运行结束
    pub async fn wait(&self) {
        let handle = {
            let mut run = self.run.lock();
            run.as_mut().and_then(|active| active.handle.take())
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Indexing run aborted: {}", e);
            }
        }
    }

    /// Index one page outside a full crawl; false when disallowed, failed or
    /// while a full run is active / 单页索引，失败、不允许或全量索引进行中时返回 false
    pub async fn index_page(&self, url: &str) -> bool {
        match self.try_index_page(url).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("indexPage {} failed: {}", url, e);
                false
            }
        }
    }

    pub async fn try_index_page(&self, url: &str) -> Result<(), IndexingError> {
        let store = &self.inner.store;
        let page_url = Url::parse(url.trim())
            .map(text::normalize_url)
            .map_err(|source| FetchError::MalformedUrl {
                url: url.to_string(),
                source,
            })?;

        let Some(seed) = self.seed_for(&page_url) else {
            let err = IndexingError::PageNotAllowed(page_url.to_string());
            if page_url.host_str().is_some() {
                let origin = text::origin_of(&page_url);
                store
                    .upsert_site_status(&origin, &origin, SiteStatus::Failed, Some(&err.to_string()))
                    .await?;
            }
            return Err(err);
        };

        // A running rebuild owns every seed site until it finalizes them
        if self.is_indexing_in_progress() {
            return Err(IndexingError::AlreadyRunning);
        }

        let site = store
            .upsert_site_status(&seed.url, &seed.name, SiteStatus::Indexing, None)
            .await?;

        let outcome: Result<(), IndexingError> = async {
            let page = self.inner.fetcher.fetch(&page_url).await?;
            self.inner.pipeline.index(&site, &page_url, &page.body).await?;
            Ok(())
        }
        .await;

        match &outcome {
            Ok(()) => {
                store.set_site_status(site.id, SiteStatus::Indexed, None).await?;
                tracing::info!("Indexed single page {}", page_url);
            }
            Err(e) => {
                store
                    .set_site_status(site.id, SiteStatus::Failed, Some(&e.to_string()))
                    .await?;
            }
        }
        outcome
    }

    /// Totals plus per-site details / 索引统计
    pub async fn statistics(&self) -> Result<Statistics, sqlx::Error> {
        let detailed = self.inner.store.site_statistics().await?;
        let total = TotalStatistics {
            sites: detailed.len() as u64,
            pages: detailed.iter().map(|s| s.pages).sum(),
            lemmas: detailed.iter().map(|s| s.lemmas).sum(),
            indexing: self.is_indexing_in_progress(),
        };
        Ok(Statistics { total, detailed })
    }

    fn seed_for(&self, page_url: &Url) -> Option<&SiteConfig> {
        self.inner.config.sites.iter().find(|seed| {
            Url::parse(&seed.url)
                .map(|root| text::belongs_to_site(page_url, &root))
                .unwrap_or(false)
        })
    }
}

async fn run_all_sites(inner: Arc<Inner>, context: Arc<CrawlContext>, seeds: Vec<SiteConfig>) {
    let engine = CrawlEngine::new(inner.fetcher.clone(), context.clone(), &inner.config);
    let site_count = seeds.len();

    stream::iter(seeds)
        .for_each_concurrent(None, |seed| {
            let inner = inner.clone();
            let engine = engine.clone();
            async move {
                let task = tokio::spawn(index_site(inner.clone(), engine, seed.clone()));
                if let Err(e) = task.await {
                    tracing::error!("Unexpected error while indexing {}: {}", seed.url, e);
                    let message = format!("Unexpected error: {}", e);
                    if let Err(e) = inner
                        .store
                        .upsert_site_status(&seed.url, &seed.name, SiteStatus::Failed, Some(&message))
                        .await
                    {
                        tracing::error!("Failed to record failure of {}: {}", seed.url, e);
                    }
                }
                inner.active_sites.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

    tracing::info!(
        "Indexing finished for {} sites, {} pages fetched{}",
        site_count,
        context.reserved(),
        if context.is_stopped() { " (stopped)" } else { "" }
    );
}

/// Rebuild one site: reset, crawl, index, finalize / 重建单个站点
async fn index_site(inner: Arc<Inner>, engine: CrawlEngine, seed: SiteConfig) {
    let store = &inner.store;

    let root = match Url::parse(&seed.url) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Malformed site url {}: {}", seed.url, e);
            let message = format!("Malformed site url: {}", e);
            if let Err(e) = store
                .upsert_site_status(&seed.url, &seed.name, SiteStatus::Failed, Some(&message))
                .await
            {
                tracing::error!("Failed to record failure of {}: {}", seed.url, e);
            }
            return;
        }
    };

    let site = match store.reset_site(&seed.url, &seed.name).await {
        Ok(site) => site,
        Err(e) => {
            tracing::error!("Failed to reset site {}: {}", seed.url, e);
            let message = e.to_string();
            if let Err(e) = store
                .upsert_site_status(&seed.url, &seed.name, SiteStatus::Failed, Some(&message))
                .await
            {
                tracing::error!("Failed to record failure of {}: {}", seed.url, e);
            }
            return;
        }
    };
    tracing::info!("Indexing site {} ({})", site.name, site.url);

    let workers = inner.config.pipeline_workers.max(1);
    let (tx, rx) = mpsc::channel::<FetchedPage>(workers * 4);
    let site = Arc::new(site);
    let indexed = Arc::new(AtomicUsize::new(0));
    let last_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let consume = ReceiverStream::new(rx).for_each_concurrent(workers, |page| {
        let site = site.clone();
        let inner = inner.clone();
        let indexed = indexed.clone();
        let last_error = last_error.clone();
        async move {
            match inner.pipeline.index(&site, &page.url, &page.body).await {
                Ok(_) => {
                    indexed.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", page.url, e);
                    *last_error.lock() = Some(e.to_string());
                }
            }
        }
    });

    let (report, ()) = tokio::join!(engine.crawl(&root, tx), consume);

    let indexed = indexed.load(Ordering::SeqCst);
    let last_error = last_error.lock().take();
    let (status, error) = if let Some(failure) = report.root_failure {
        (SiteStatus::Failed, Some(failure))
    } else if report.stopped {
        (SiteStatus::Failed, Some(STOPPED_BY_USER.to_string()))
    } else if indexed == 0 && last_error.is_some() {
        (SiteStatus::Failed, last_error)
    } else {
        (SiteStatus::Indexed, None)
    };

    match &error {
        Some(e) => tracing::error!("Site {} failed: {}", site.url, e),
        None => tracing::info!(
            "Site {} indexed: {} pages crawled, {} indexed",
            site.url,
            report.discovered.len(),
            indexed
        ),
    }
    if let Err(e) = store.set_site_status(site.id, status, error.as_deref()).await {
        tracing::error!("Failed to finalize site {}: {}", site.url, e);
    }
}
