//! Content indexing pipeline / 内容索引流水线
//!
//! HTML → plain text → lemma counts → one atomic write unit per page.

use scraper::Html;
use std::sync::Arc;
use url::Url;

use crate::config::{IndexingConfig, RankWeighting};
use crate::error::PipelineError;
use crate::lemmatizer::{count_lemmas, Lemmatizer};
use crate::models::Site;
use crate::store::IndexStore;
use crate::text;

/// What one `index` call wrote / 单页索引结果
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPage {
    pub page_id: i64,
    pub path: String,
    pub lemmas: usize,
    pub replaced: bool,
}

pub struct IndexingPipeline {
    store: IndexStore,
    lemmatizer: Arc<dyn Lemmatizer>,
    weighting: RankWeighting,
    constant_rank: f32,
}

impl IndexingPipeline {
    pub fn new(store: IndexStore, lemmatizer: Arc<dyn Lemmatizer>, config: &IndexingConfig) -> Self {
        Self {
            store,
            lemmatizer,
            weighting: config.rank_weighting,
            constant_rank: config.constant_rank,
        }
    }

    /// Index one fetched page of `site` / 索引单个页面
    ///
    /// Re-indexing the same path first retracts the page's previous lemma
    /// counts and index entries, so repeated calls never accumulate.
    pub async fn index(&self, site: &Site, page_url: &Url, raw_html: &str) -> Result<IndexedPage, PipelineError> {
        let (title, content) = {
            let document = Html::parse_document(raw_html);
            (text::extract_title(&document), text::extract_text(&document))
        };
        let path = text::page_path(page_url);
        let counts = self.lemma_counts(&title, &content);
        let max_count = counts.iter().map(|(_, count)| *count).max().unwrap_or(1);

        let mut unit = self.store.begin_page_write().await?;

        let previous = unit.find_page(site.id, &path).await?;
        if let Some(old) = &previous {
            let old_counts = self.lemma_counts(&old.title, &old.content);
            unit.retract_page(site.id, old.id, &old_counts).await?;
        }

        let page_id = unit.upsert_page(site.id, &path, &title, &content).await?;
        for (lemma, count) in &counts {
            let lemma_id = unit.add_lemma(site.id, lemma, *count).await?;
            unit.add_index_entry(page_id, lemma_id, self.rank_for(*count, max_count)).await?;
        }
        unit.touch_site(site.id).await?;
        unit.commit().await?;

        tracing::debug!("Indexed {}{} ({} lemmas)", site.url, path, counts.len());
        Ok(IndexedPage {
            page_id,
            path,
            lemmas: counts.len(),
            replaced: previous.is_some(),
        })
    }

    /// Title and body both count as page text / 标题与正文一起参与统计
    fn lemma_counts(&self, title: &str, content: &str) -> Vec<(String, i64)> {
        count_lemmas(&format!("{} {}", title, content), self.lemmatizer.as_ref())
    }

    fn rank_for(&self, count: i64, max_count: i64) -> f32 {
        match self.weighting {
            RankWeighting::Constant => self.constant_rank,
            RankWeighting::TermFrequency => (count as f32 / max_count.max(1) as f32).min(1.0),
        }
    }
}
