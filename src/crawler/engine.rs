//! Fork-join site crawl / 分叉-合并式站点爬取
//!
//! Every fetched page spawns one child unit per newly visited link; a unit
//! returns only after all of its children have returned, merging their URLs.

use futures::future::{BoxFuture, FutureExt};
use rand::Rng;
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use url::Url;

use super::context::CrawlContext;
use super::fetcher::{FetchedPage, PageFetcher};
use crate::config::IndexingConfig;
use crate::text;

/// Result of one site crawl / 单站点爬取结果
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Successfully fetched URLs, root included / 成功抓取的URL
    pub discovered: HashSet<String>,
    /// Set when the site root itself could not be crawled / 根页面失败原因
    pub root_failure: Option<String>,
    /// The stop signal was raised during this crawl / 是否被停止
    pub stopped: bool,
}

enum Visit {
    Fetched(HashSet<String>),
    Stopped,
    Failed(String),
}

/// Crawl engine shared by every site of one run / 一次运行内共享的爬取引擎
#[derive(Clone)]
pub struct CrawlEngine {
    fetcher: Arc<dyn PageFetcher>,
    context: Arc<CrawlContext>,
    permits: Arc<Semaphore>,
    delay_ms: (u64, u64),
}

impl CrawlEngine {
    pub fn new(fetcher: Arc<dyn PageFetcher>, context: Arc<CrawlContext>, config: &IndexingConfig) -> Self {
        Self {
            fetcher,
            context,
            permits: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
            delay_ms: config.delay_range_ms(),
        }
    }

    /// Crawl a site from its root. Every fetched page is sent to `sink`.
    /// 从站点根开始爬取，抓取到的页面发送给 `sink`
    pub async fn crawl(&self, root: &Url, sink: mpsc::Sender<FetchedPage>) -> CrawlReport {
        let root = text::normalize_url(root.clone());
        let mut report = CrawlReport::default();

        if !self.context.mark_visited(root.as_str()) {
            report.root_failure = Some(format!("{} was already crawled in this run", root));
            return report;
        }
        if !self.context.try_reserve() {
            report.root_failure = Some("Page budget exhausted before the site root was fetched".to_string());
            return report;
        }

        let site_root = Arc::new(root.clone());
        match Self::visit(self.clone(), site_root, root, sink).await {
            Visit::Fetched(urls) => report.discovered = urls,
            Visit::Stopped => {}
            Visit::Failed(reason) => {
                report.root_failure = Some(format!("Site root is unreachable: {}", reason))
            }
        }
        report.stopped = self.context.is_stopped();
        report
    }

    fn visit(
        engine: CrawlEngine,
        site_root: Arc<Url>,
        url: Url,
        sink: mpsc::Sender<FetchedPage>,
    ) -> BoxFuture<'static, Visit> {
        async move {
            if engine.context.is_stopped() {
                return Visit::Stopped;
            }
            engine.throttle().await;

            let fetched = {
                let Ok(_permit) = engine.permits.clone().acquire_owned().await else {
                    return Visit::Stopped;
                };
                // Last check before the request goes out
                if engine.context.is_stopped() {
                    return Visit::Stopped;
                }
                tracing::debug!("Fetching {}", url);
                engine.fetcher.fetch(&url).await
            };

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", url, e);
                    return Visit::Failed(e.to_string());
                }
            };

            let links = links_of(&page.body, &url);
            if sink.send(page).await.is_err() {
                tracing::warn!("Indexing pipeline closed, {} will not be indexed", url);
            }

            let mut discovered = HashSet::new();
            discovered.insert(url.to_string());

            let mut children = JoinSet::new();
            for link in links {
                if engine.context.is_stopped() {
                    break;
                }
                if !text::is_crawlable(&link, &site_root) || !engine.context.mark_visited(link.as_str()) {
                    continue;
                }
                if !engine.context.try_reserve() {
                    tracing::debug!("Page budget exhausted, not following {}", link);
                    break;
                }
                children.spawn(Self::visit(engine.clone(), site_root.clone(), link, sink.clone()));
            }

            while let Some(joined) = children.join_next().await {
                match joined {
                    Ok(Visit::Fetched(urls)) => discovered.extend(urls),
                    Ok(Visit::Stopped) | Ok(Visit::Failed(_)) => {}
                    Err(e) => tracing::error!("Crawl unit under {} aborted: {}", url, e),
                }
            }

            Visit::Fetched(discovered)
        }
        .boxed()
    }

    /// Randomized pre-fetch delay / 抓取前随机延迟
    async fn throttle(&self) {
        let (min, max) = self.delay_ms;
        if max == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

// `Html` is not Send, keep it out of any await
fn links_of(body: &str, url: &Url) -> Vec<Url> {
    let document = Html::parse_document(body);
    text::extract_links(&document, url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::scripted::ScriptedFetcher;
    use crate::error::FetchError;
    use async_trait::async_trait;

    fn test_config(max_pages: usize) -> IndexingConfig {
        IndexingConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_pages,
            max_concurrent_fetches: 4,
            ..IndexingConfig::default()
        }
    }

    async fn run_crawl(fetcher: Arc<dyn PageFetcher>, context: Arc<CrawlContext>, root: &str) -> (CrawlReport, usize) {
        let engine = CrawlEngine::new(fetcher, context, &test_config(1000));
        let (tx, mut rx) = mpsc::channel(8);
        let collector = tokio::spawn(async move {
            let mut received = 0;
            while rx.recv().await.is_some() {
                received += 1;
            }
            received
        });
        let report = engine.crawl(&Url::parse(root).unwrap(), tx).await;
        let received = collector.await.unwrap();
        (report, received)
    }

    fn cyclic_site() -> ScriptedFetcher {
        ScriptedFetcher::new()
            .page(
                "https://example.com/",
                r#"<a href="/a">A</a><a href="/b/">B</a><a href="https://other.example/">X</a><a href="/logo.png">L</a>"#,
            )
            .page("https://example.com/a", r#"<a href="/b">B</a><a href="/">Home</a><a href="/c">C</a>"#)
            .page("https://example.com/b", r#"<a href="/a#top">A</a><a href="/c">C</a>"#)
            .page("https://example.com/c", r#"<a href="/missing">M</a><a href="/">Home</a>"#)
    }

    #[tokio::test]
    async fn test_crawl_visits_every_page_once() {
        let fetcher = Arc::new(cyclic_site());
        let context = Arc::new(CrawlContext::new(1000));
        let (report, received) = run_crawl(fetcher.clone(), context, "https://example.com").await;

        let mut discovered: Vec<_> = report.discovered.into_iter().collect();
        discovered.sort();
        assert_eq!(
            discovered,
            vec![
                "https://example.com/",
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/c",
            ]
        );
        assert_eq!(received, 4);
        assert!(report.root_failure.is_none());
        assert!(!report.stopped);

        assert_eq!(fetcher.max_fetches_per_url(), 1);
        assert_eq!(fetcher.fetch_count("https://example.com/missing"), 1);
        assert_eq!(fetcher.fetch_count("https://other.example/"), 0);
        assert_eq!(fetcher.fetch_count("https://example.com/logo.png"), 0);
    }

    #[tokio::test]
    async fn test_unreachable_root() {
        let fetcher = Arc::new(ScriptedFetcher::new().status("https://example.com/", 503));
        let context = Arc::new(CrawlContext::new(10));
        let (report, received) = run_crawl(fetcher, context, "https://example.com/").await;

        assert!(report.discovered.is_empty());
        assert_eq!(received, 0);
        let failure = report.root_failure.unwrap();
        assert!(failure.contains("unreachable"), "{}", failure);
    }

    #[tokio::test]
    async fn test_page_budget_limits_fetches() {
        let fetcher = Arc::new(cyclic_site());
        let context = Arc::new(CrawlContext::new(2));
        let engine = CrawlEngine::new(fetcher.clone(), context.clone(), &test_config(2));
        let (tx, mut rx) = mpsc::channel(8);
        let collector = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let report = engine.crawl(&Url::parse("https://example.com/").unwrap(), tx).await;
        collector.await.unwrap();

        assert_eq!(report.discovered.len(), 2);
        assert_eq!(fetcher.total_fetches(), 2);
        assert_eq!(context.reserved(), 2);
    }

    /// Raises the stop signal while the root is being fetched
    struct StoppingFetcher {
        inner: ScriptedFetcher,
        context: Arc<CrawlContext>,
    }

    #[async_trait]
    impl PageFetcher for StoppingFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            self.context.stop();
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn test_stop_prevents_new_fetches() {
        let context = Arc::new(CrawlContext::new(1000));
        let fetcher = Arc::new(StoppingFetcher {
            inner: cyclic_site(),
            context: context.clone(),
        });
        let (report, received) = run_crawl(fetcher.clone(), context, "https://example.com/").await;

        assert!(report.stopped);
        assert_eq!(fetcher.inner.total_fetches(), 1);
        // The in-flight root fetch completes and is kept
        assert_eq!(received, 1);
        assert!(report.discovered.contains("https://example.com/"));
    }

    #[tokio::test]
    async fn test_stopped_before_start_fetches_nothing() {
        let fetcher = Arc::new(cyclic_site());
        let context = Arc::new(CrawlContext::new(1000));
        context.stop();
        let (report, received) = run_crawl(fetcher.clone(), context, "https://example.com/").await;

        assert!(report.stopped);
        assert!(report.root_failure.is_none());
        assert_eq!(received, 0);
        assert_eq!(fetcher.total_fetches(), 0);
    }

    /// Records the (paused) clock at every fetch
    struct TimedFetcher {
        inner: ScriptedFetcher,
        fetched_at: parking_lot::Mutex<Vec<tokio::time::Instant>>,
    }

    #[async_trait]
    impl PageFetcher for TimedFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            self.fetched_at.lock().push(tokio::time::Instant::now());
            self.inner.fetch(url).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_wait_for_random_delay() {
        let fetcher = Arc::new(TimedFetcher {
            inner: ScriptedFetcher::new()
                .page("https://example.com/", r#"<a href="/a">A</a>"#)
                .page("https://example.com/a", "<p>leaf</p>"),
            fetched_at: parking_lot::Mutex::new(Vec::new()),
        });
        let config = IndexingConfig {
            min_delay_ms: 5,
            max_delay_ms: 10,
            ..test_config(10)
        };
        let engine = CrawlEngine::new(fetcher.clone(), Arc::new(CrawlContext::new(10)), &config);
        let (tx, mut rx) = mpsc::channel(8);
        let collector = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let started = tokio::time::Instant::now();
        let report = engine.crawl(&Url::parse("https://example.com/").unwrap(), tx).await;
        collector.await.unwrap();
        assert_eq!(report.discovered.len(), 2);

        let fetched_at = fetcher.fetched_at.lock().clone();
        assert_eq!(fetched_at.len(), 2);
        let root_wait = fetched_at[0] - started;
        assert!(root_wait >= Duration::from_millis(5), "{:?}", root_wait);
        assert!(root_wait <= Duration::from_millis(10), "{:?}", root_wait);
        // The child is delayed again after its parent's fetch
        assert!(fetched_at[1] - fetched_at[0] >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_malformed_links_are_skipped() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page("https://example.com/", r#"<a href="http://[::1">bad</a><a href="/ok">ok</a>"#)
                .page("https://example.com/ok", "<p>fine</p>"),
        );
        let context = Arc::new(CrawlContext::new(10));
        let (report, _) = run_crawl(fetcher, context, "https://example.com/").await;
        assert_eq!(report.discovered.len(), 2);
    }
}
