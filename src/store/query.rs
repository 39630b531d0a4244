//! Read-side queries: search lookups and statistics / 查询与统计
use sqlx::{QueryBuilder, Row, Sqlite};

use super::IndexStore;
use crate::models::{IndexEntry, Lemma, Page, SiteStatistics, SiteStatus};

/// Page matched by a lemma lookup, with its site / 命中的页面
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PageHit {
    pub page_id: i64,
    pub path: String,
    pub title: String,
    pub content: String,
    pub site_url: String,
    pub site_name: String,
}

impl IndexStore {
    /// Number of indexed pages, for one site or all / 页面总数
    pub async fn count_pages(&self, site_id: Option<i64>) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = match site_id {
            Some(id) => {
                sqlx::query_as("SELECT COUNT(*) FROM page WHERE site_id = ?")
                    .bind(id)
                    .fetch_one(&self.db)
                    .await?
            }
            None => sqlx::query_as("SELECT COUNT(*) FROM page").fetch_one(&self.db).await?,
        };
        Ok(count)
    }

    /// Site-wide (or global) frequency of a lemma / 词元频率
    pub async fn lemma_frequency(&self, text: &str, site_id: Option<i64>) -> Result<i64, sqlx::Error> {
        let (frequency,): (i64,) = match site_id {
            Some(id) => {
                sqlx::query_as(
                    "SELECT COALESCE(SUM(frequency), 0) FROM lemma WHERE text = ? AND site_id = ?",
                )
                .bind(text)
                .bind(id)
                .fetch_one(&self.db)
                .await?
            }
            None => {
                sqlx::query_as("SELECT COALESCE(SUM(frequency), 0) FROM lemma WHERE text = ?")
                    .bind(text)
                    .fetch_one(&self.db)
                    .await?
            }
        };
        Ok(frequency)
    }

    /// Distinct pages referenced by index entries of the given lemmas, skip-then-take
    /// 按词元查找去重后的页面（先跳过再截取）
    pub async fn find_pages_by_lemmas(
        &self,
        lemmas: &[String],
        site_id: Option<i64>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<PageHit>, sqlx::Error> {
        if lemmas.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"SELECT p.id AS page_id, p.path, p.title, p.content, s.url AS site_url, s.name AS site_name
            FROM page p
            JOIN site s ON s.id = p.site_id
            WHERE p.id IN (
                SELECT DISTINCT i.page_id FROM site_index i
                JOIN lemma l ON l.id = i.lemma_id
                WHERE l.text IN ("#,
        );
        let mut separated = builder.separated(", ");
        for lemma in lemmas {
            separated.push_bind(lemma);
        }
        separated.push_unseparated(")");
        if let Some(id) = site_id {
            builder.push(" AND l.site_id = ").push_bind(id);
        }
        builder
            .push(") ORDER BY p.id LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        builder.build_query_as::<PageHit>().fetch_all(&self.db).await
    }

    pub async fn list_pages(&self, site_id: i64) -> Result<Vec<Page>, sqlx::Error> {
        sqlx::query_as::<_, Page>(
            "SELECT id, site_id, path, title, content FROM page WHERE site_id = ? ORDER BY id",
        )
        .bind(site_id)
        .fetch_all(&self.db)
        .await
    }

    pub async fn list_lemmas(&self, site_id: i64) -> Result<Vec<Lemma>, sqlx::Error> {
        sqlx::query_as::<_, Lemma>(
            "SELECT id, site_id, text, frequency FROM lemma WHERE site_id = ? ORDER BY text",
        )
        .bind(site_id)
        .fetch_all(&self.db)
        .await
    }

    pub async fn list_index_entries(&self, page_id: i64) -> Result<Vec<IndexEntry>, sqlx::Error> {
        sqlx::query_as::<_, IndexEntry>(
            "SELECT id, page_id, lemma_id, rank_value FROM site_index WHERE page_id = ? ORDER BY lemma_id",
        )
        .bind(page_id)
        .fetch_all(&self.db)
        .await
    }

    /// Per-site page and lemma counts / 站点统计
    pub async fn site_statistics(&self) -> Result<Vec<SiteStatistics>, sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT s.url, s.name, s.status, s.status_time, s.last_error,
                (SELECT COUNT(*) FROM page p WHERE p.site_id = s.id) AS pages,
                (SELECT COUNT(*) FROM lemma l WHERE l.site_id = s.id) AS lemmas
            FROM site s ORDER BY s.id"#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let status: String = row.get("status");
                SiteStatistics {
                    url: row.get("url"),
                    name: row.get("name"),
                    status: SiteStatus::parse(&status),
                    status_time: row.get("status_time"),
                    error: row.get("last_error"),
                    pages: row.get::<i64, _>("pages") as u64,
                    lemmas: row.get::<i64, _>("lemmas") as u64,
                }
            })
            .collect())
    }
}
