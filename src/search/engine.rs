//! Query resolution and ranking over the lemma index / 基于词元索引的查询与排序
//!
//! 1. Lemmatize the query with the indexing tokenizer / 查询词元化
//! 2. Drop stop-lemmas (frequency above `stop_lemma_ratio` × page count) / 去除高频词元
//! 3. Distinct matching pages, skip-then-take / 去重后分页
//! 4. Relevance = literal query hits in title + content / query length / 相关度
//! 5. Descending relevance, ties by page id / 排序

use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::lemmatizer::{query_lemmas, tokenize, Lemmatizer};
use crate::models::SearchResult;
use crate::store::{IndexStore, PageHit};
use url::Url;

pub struct SearchEngine {
    store: IndexStore,
    lemmatizer: Arc<dyn Lemmatizer>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: IndexStore, lemmatizer: Arc<dyn Lemmatizer>, config: SearchConfig) -> Self {
        Self {
            store,
            lemmatizer,
            config,
        }
    }

    /// Ranked search, optionally restricted to one site / 搜索
    ///
    /// `limit == 0` means the configured default limit.
    pub async fn search(
        &self,
        query: &str,
        site: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let raw_query = query;
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let site_id = match site.map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => Some(self.resolve_site(url).await?),
            None => None,
        };

        let lemmas = query_lemmas(query, self.lemmatizer.as_ref());
        if lemmas.is_empty() {
            tracing::debug!("Query {:?} has no searchable words", query);
            return Ok(Vec::new());
        }

        let lemmas = self.discriminative_lemmas(lemmas, site_id).await?;
        let limit = if limit == 0 { self.config.default_limit } else { limit };
        let hits = self
            .store
            .find_pages_by_lemmas(&lemmas, site_id, offset, limit)
            .await?;

        let highlighter = Highlighter::new(query);
        let mut ranked: Vec<(PageHit, f32)> = hits
            .into_iter()
            .map(|hit| {
                let score = relevance(raw_query, &hit.title, &hit.content);
                (hit, score)
            })
            .collect();
        ranked.sort_by(|(a, a_score), (b, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then(a.page_id.cmp(&b.page_id))
        });

        tracing::debug!("Query {:?} matched {} pages via {:?}", query, ranked.len(), lemmas);
        Ok(ranked
            .into_iter()
            .map(|(hit, relevance)| SearchResult {
                page_url: page_url(&hit.site_url, &hit.path),
                snippet: highlighter.snippet(&hit.content, self.config.snippet_length),
                site: hit.site_url,
                site_name: hit.site_name,
                title: hit.title,
                relevance,
            })
            .collect())
    }

    async fn resolve_site(&self, url: &str) -> Result<i64, SearchError> {
        let mut candidates = vec![url.to_string()];
        let trimmed = url.trim_end_matches('/');
        if trimmed != url {
            candidates.push(trimmed.to_string());
        } else {
            candidates.push(format!("{}/", url));
        }

        for candidate in candidates {
            if let Some(site) = self.store.find_site_by_url(&candidate).await? {
                return Ok(site.id);
            }
        }
        Err(SearchError::UnknownSite(url.to_string()))
    }

    /// Drop stop-lemmas and order the rest rarest first / 去除高频词元并按频率升序
    ///
    /// When every lemma is a stop-lemma the unfiltered set is kept.
    async fn discriminative_lemmas(
        &self,
        lemmas: Vec<String>,
        site_id: Option<i64>,
    ) -> Result<Vec<String>, SearchError> {
        let total_pages = self.store.count_pages(site_id).await?;
        let threshold = self.config.stop_lemma_ratio * total_pages as f64;

        let mut weighted = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            let frequency = self.store.lemma_frequency(&lemma, site_id).await?;
            weighted.push((lemma, frequency));
        }

        let mut kept: Vec<(String, i64)> = weighted
            .iter()
            .filter(|(_, frequency)| (*frequency as f64) <= threshold)
            .cloned()
            .collect();
        if kept.is_empty() {
            kept = weighted;
        }
        kept.sort_by_key(|(_, frequency)| *frequency);
        Ok(kept.into_iter().map(|(lemma, _)| lemma).collect())
    }
}

/// `page.path` is absolute, so it replaces any path prefix of the site root
/// 页面地址 = 站点源 + 页面路径
fn page_url(site_url: &str, path: &str) -> String {
    match Url::parse(site_url).and_then(|root| root.join(path)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", site_url.trim_end_matches('/'), path),
    }
}

/// Literal, case-insensitive hits of the trimmed query in title and content,
/// divided by the character length of the query as given / 相关度
pub fn relevance(query: &str, title: &str, content: &str) -> f32 {
    let needle = query.trim().to_lowercase();
    let length = query.chars().count();
    if needle.is_empty() {
        return 0.0;
    }
    let hits = title.to_lowercase().matches(needle.as_str()).count()
        + content.to_lowercase().matches(needle.as_str()).count();
    hits as f32 / length as f32
}

/// Locates and marks query words inside page text / 摘要高亮
struct Highlighter {
    phrase: Option<Regex>,
    words: Option<Regex>,
}

impl Highlighter {
    fn new(query: &str) -> Self {
        let words: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|w| w.chars().count() > 1)
            .map(|w| regex::escape(&w))
            .collect();
        Self {
            phrase: case_insensitive(&regex::escape(query)),
            words: if words.is_empty() {
                None
            } else {
                case_insensitive(&words.join("|"))
            },
        }
    }

    /// `length` characters of content around the first hit, hits wrapped in `<b>`
    fn snippet(&self, content: &str, length: usize) -> String {
        let found = [&self.phrase, &self.words]
            .into_iter()
            .flatten()
            .find_map(|re| re.find(content).map(|m| (re, m.start())));

        let Some((pattern, hit_start)) = found else {
            let end = byte_offset(content, length);
            let mut snippet = escape_html(&content[..end]);
            if end < content.len() {
                snippet.push_str("...");
            }
            return snippet;
        };

        let hit_char = content[..hit_start].chars().count();
        let start = byte_offset(content, hit_char.saturating_sub(length / 4));
        let end = start + byte_offset(&content[start..], length);
        let window = &content[start..end];

        let mut snippet = String::new();
        if start > 0 {
            snippet.push_str("...");
        }
        let mut last = 0;
        for m in pattern.find_iter(window) {
            snippet.push_str(&escape_html(&window[last..m.start()]));
            snippet.push_str("<b>");
            snippet.push_str(&escape_html(m.as_str()));
            snippet.push_str("</b>");
            last = m.end();
        }
        snippet.push_str(&escape_html(&window[last..]));
        if end < content.len() {
            snippet.push_str("...");
        }
        snippet
    }
}

fn case_insensitive(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

/// Byte offset of the `chars`-th character, clamped to the string end
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexingConfig;
    use crate::indexing::IndexingPipeline;
    use crate::lemmatizer::SnowballLemmatizer;
    use crate::models::Site;
    use url::Url;

    struct Fixture {
        store: IndexStore,
        pipeline: IndexingPipeline,
        engine: SearchEngine,
    }

    async fn fixture() -> Fixture {
        let store = IndexStore::in_memory().await.unwrap();
        let lemmatizer: Arc<dyn Lemmatizer> = Arc::new(SnowballLemmatizer::new());
        Fixture {
            pipeline: IndexingPipeline::new(store.clone(), lemmatizer.clone(), &IndexingConfig::default()),
            engine: SearchEngine::new(store.clone(), lemmatizer, SearchConfig::default()),
            store,
        }
    }

    impl Fixture {
        async fn site(&self, url: &str) -> Site {
            self.store.reset_site(url, url).await.unwrap()
        }

        async fn page(&self, site: &Site, path: &str, html: &str) {
            let url = Url::parse(&format!("{}{}", site.url, path)).unwrap();
            self.pipeline.index(site, &url, html).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_blank_query_rejected_without_store_access() {
        let f = fixture().await;
        f.store.close().await;
        assert!(matches!(f.engine.search("", None, 0, 20).await, Err(SearchError::EmptyQuery)));
        assert!(matches!(f.engine.search("   ", None, 0, 20).await, Err(SearchError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_ranked_by_literal_hits() {
        let f = fixture().await;
        let site = f.site("https://example.com").await;
        f.page(&site, "/one", "<p>my cat sleeps</p>").await;
        f.page(&site, "/two", "<title>Cat news</title><p>the cat runs</p>").await;
        f.page(&site, "/three", "<p>dog runs</p>").await;

        let results = f.engine.search("cat", None, 0, 20).await.unwrap();
        let urls: Vec<_> = results.iter().map(|r| r.page_url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/two", "https://example.com/one"]);
        assert!((results[0].relevance - 2.0 / 3.0).abs() < 1e-6);
        assert!((results[1].relevance - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(results[0].title, "Cat news");
        assert_eq!(results[0].site, "https://example.com");
        assert_eq!(results[0].snippet, "the <b>cat</b> runs");
    }

    #[tokio::test]
    async fn test_stop_lemmas_ignored_next_to_rarer_lemmas() {
        let f = fixture().await;
        let site = f.site("https://example.com").await;
        for i in 0..19 {
            f.page(&site, &format!("/p{}", i), "<p>common word here</p>").await;
        }
        f.page(&site, "/rare", "<p>unique</p>").await;

        // "common" is on 19 of 20 pages (95% > 90%)
        let results = f.engine.search("common unique", None, 0, 50).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page_url, "https://example.com/rare");

        // Alone it is still searchable
        let results = f.engine.search("common", None, 0, 50).await.unwrap();
        assert_eq!(results.len(), 19);
    }

    #[tokio::test]
    async fn test_site_filter() {
        let f = fixture().await;
        let a = f.site("https://a.example").await;
        let b = f.site("https://b.example").await;
        f.page(&a, "/", "<p>cat</p>").await;
        f.page(&b, "/", "<p>cat cat</p>").await;

        let all = f.engine.search("cat", None, 0, 20).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_a = f.engine.search("cat", Some("https://a.example/"), 0, 20).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].site, "https://a.example");

        let unknown = f.engine.search("cat", Some("https://c.example"), 0, 20).await;
        assert!(matches!(unknown, Err(SearchError::UnknownSite(_))));
    }

    #[tokio::test]
    async fn test_page_url_under_site_with_path_prefix() {
        let f = fixture().await;
        let site = f.site("https://example.com/blog").await;
        f.page(&site, "/post", "<p>cat</p>").await;
        f.page(&site, "/list?page=2", "<p>cat</p>").await;

        let mut urls: Vec<_> = f
            .engine
            .search("cat", None, 0, 20)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.page_url)
            .collect();
        urls.sort();
        assert_eq!(
            urls,
            vec!["https://example.com/blog/list?page=2", "https://example.com/blog/post"]
        );
    }

    #[tokio::test]
    async fn test_offset_and_limit() {
        let f = fixture().await;
        let site = f.site("https://example.com").await;
        for i in 0..5 {
            f.page(&site, &format!("/p{}", i), "<p>cat</p>").await;
        }

        assert_eq!(f.engine.search("cat", None, 0, 2).await.unwrap().len(), 2);
        assert_eq!(f.engine.search("cat", None, 4, 2).await.unwrap().len(), 1);
        assert_eq!(f.engine.search("cat", None, 5, 2).await.unwrap().len(), 0);
        assert_eq!(f.engine.search("cat", None, 0, 0).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_unsearchable_query_is_empty() {
        let f = fixture().await;
        let site = f.site("https://example.com").await;
        f.page(&site, "/", "<p>the cat</p>").await;
        assert!(f.engine.search("the and of", None, 0, 20).await.unwrap().is_empty());
        assert!(f.engine.search("???", None, 0, 20).await.unwrap().is_empty());
    }

    #[test]
    fn test_relevance() {
        assert!((relevance("Cat", "CAT", "a cat and a cAt") - 1.0).abs() < 1e-6);
        assert_eq!(relevance("dog", "cat", "cat"), 0.0);
        // Non-overlapping hits
        assert!((relevance("aa", "", "aaaa") - 1.0).abs() < 1e-6);
        // Surrounding spaces count toward the length, not the match
        assert!((relevance(" cat ", "", "cat cat") - 0.4).abs() < 1e-6);
        assert_eq!(relevance("   ", "", "cat"), 0.0);
    }

    #[test]
    fn test_snippet_window() {
        let content = format!("{} cat {}", "x".repeat(100), "y".repeat(100));
        let snippet = Highlighter::new("CAT").snippet(&content, 40);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("<b>cat</b>"));

        let plain = Highlighter::new("zebra").snippet("short <text>", 40);
        assert_eq!(plain, "short &lt;text&gt;");

        let cyrillic = Highlighter::new("кот").snippet("Пушистый Кот спит", 8);
        assert!(cyrillic.contains("<b>Кот</b>"));
    }
}
