//! Atomic page write unit / 单页原子写入
use sqlx::{Sqlite, Transaction};
use tokio::sync::OwnedMutexGuard;

use super::now;
use crate::models::{IndexEntry, Page};

/// Page, lemma and index writes for one page, committed together.
/// Dropping the unit without `commit` rolls everything back.
pub struct PageWriteUnit {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl PageWriteUnit {
    pub(super) fn new(gate: OwnedMutexGuard<()>, tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx, _gate: gate }
    }

    pub async fn find_page(&mut self, site_id: i64, path: &str) -> Result<Option<Page>, sqlx::Error> {
        sqlx::query_as::<_, Page>(
            "SELECT id, site_id, path, title, content FROM page WHERE site_id = ? AND path = ?",
        )
        .bind(site_id)
        .bind(path)
        .fetch_optional(&mut *self.tx)
        .await
    }

    /// Take back a page's previous contribution: lemma counts and index rows
    /// 撤销页面旧的词频贡献和索引
    pub async fn retract_page(
        &mut self,
        site_id: i64,
        page_id: i64,
        previous_counts: &[(String, i64)],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM site_index WHERE page_id = ?")
            .bind(page_id)
            .execute(&mut *self.tx)
            .await?;

        for (text, count) in previous_counts {
            sqlx::query("UPDATE lemma SET frequency = frequency - ? WHERE site_id = ? AND text = ?")
                .bind(count)
                .bind(site_id)
                .bind(text)
                .execute(&mut *self.tx)
                .await?;
        }

        sqlx::query("DELETE FROM lemma WHERE site_id = ? AND frequency <= 0")
            .bind(site_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Insert or replace the page row, returns its id / 写入或替换页面
    pub async fn upsert_page(
        &mut self,
        site_id: i64,
        path: &str,
        title: &str,
        content: &str,
    ) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO page (site_id, path, title, content) VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, path) DO UPDATE SET
                title = excluded.title,
                content = excluded.content
            RETURNING id"#,
        )
        .bind(site_id)
        .bind(path)
        .bind(title)
        .bind(content)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    /// Atomic frequency upsert for (site, lemma) / 原子累加词频
    pub async fn add_lemma(&mut self, site_id: i64, text: &str, count: i64) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO lemma (site_id, text, frequency) VALUES (?, ?, ?)
            ON CONFLICT(site_id, text) DO UPDATE SET frequency = frequency + excluded.frequency
            RETURNING id"#,
        )
        .bind(site_id)
        .bind(text)
        .bind(count)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    pub async fn add_index_entry(
        &mut self,
        page_id: i64,
        lemma_id: i64,
        rank_value: f32,
    ) -> Result<(), crate::error::PipelineError> {
        let rank_value = IndexEntry::check_rank(rank_value)?;
        sqlx::query("INSERT INTO site_index (page_id, lemma_id, rank_value) VALUES (?, ?, ?)")
            .bind(page_id)
            .bind(lemma_id)
            .bind(rank_value)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Refresh the site's status_time as a progress signal / 刷新站点状态时间
    pub async fn touch_site(&mut self, site_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE site SET status_time = ? WHERE id = ?")
            .bind(now())
            .bind(site_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
