//! Site rows and status transitions / 站点状态
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{now, IndexStore};
use crate::models::{Site, SiteStatus};

const SITE_COLUMNS: &str = "id, url, name, status, status_time, last_error";

fn site_from_row(row: &SqliteRow) -> Site {
    let status: String = row.get("status");
    Site {
        id: row.get("id"),
        url: row.get("url"),
        name: row.get("name"),
        status: SiteStatus::parse(&status),
        status_time: row.get("status_time"),
        last_error: row.get("last_error"),
    }
}

impl IndexStore {
    /// Find a site by url, case-insensitive / 按URL查找站点（忽略大小写）
    pub async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM site WHERE url = ?", SITE_COLUMNS))
            .bind(url)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(site_from_row))
    }

    #[cfg(test)]
    pub async fn get_site(&self, site_id: i64) -> Result<Option<Site>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM site WHERE id = ?", SITE_COLUMNS))
            .bind(site_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(site_from_row))
    }

    #[cfg(test)]
    pub async fn list_sites(&self) -> Result<Vec<Site>, sqlx::Error> {
        let rows = sqlx::query(&format!("SELECT {} FROM site ORDER BY id", SITE_COLUMNS))
            .fetch_all(&self.db)
            .await?;
        Ok(rows.iter().map(site_from_row).collect())
    }

    /// Discard a site's pages, lemmas and index entries and put it back into INDEXING
    /// 清空站点数据并重置为 INDEXING（全量重建）
    pub async fn reset_site(&self, url: &str, name: &str) -> Result<Site, sqlx::Error> {
        let _gate = self.lock_writes().await;
        let mut tx = self.db.begin().await?;
        let ts = now();

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM site WHERE url = ?")
            .bind(url)
            .fetch_optional(&mut *tx)
            .await?;

        let site_id = match existing {
            Some((id,)) => {
                sqlx::query(
                    "DELETE FROM site_index WHERE page_id IN (SELECT id FROM page WHERE site_id = ?)",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM page WHERE site_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM lemma WHERE site_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "UPDATE site SET name = ?, status = ?, status_time = ?, last_error = NULL WHERE id = ?",
                )
                .bind(name)
                .bind(SiteStatus::Indexing.as_str())
                .bind(&ts)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => {
                let (id,): (i64,) = sqlx::query_as(
                    "INSERT INTO site (url, name, status, status_time) VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(url)
                .bind(name)
                .bind(SiteStatus::Indexing.as_str())
                .bind(&ts)
                .fetch_one(&mut *tx)
                .await?;
                id
            }
        };

        tx.commit().await?;

        Ok(Site {
            id: site_id,
            url: url.to_string(),
            name: name.to_string(),
            status: SiteStatus::Indexing,
            status_time: ts,
            last_error: None,
        })
    }

    /// Insert or update a site row with the given status, keeping its data
    /// 写入站点状态（不清空数据）
    pub async fn upsert_site_status(
        &self,
        url: &str,
        name: &str,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<Site, sqlx::Error> {
        let _gate = self.lock_writes().await;
        let row = sqlx::query(&format!(
            r#"INSERT INTO site (url, name, status, status_time, last_error) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                status = excluded.status,
                status_time = excluded.status_time,
                last_error = excluded.last_error
            RETURNING {}"#,
            SITE_COLUMNS
        ))
        .bind(url)
        .bind(name)
        .bind(status.as_str())
        .bind(now())
        .bind(last_error)
        .fetch_one(&self.db)
        .await?;
        Ok(site_from_row(&row))
    }

    /// Status transition / 更新站点状态
    pub async fn set_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let _gate = self.lock_writes().await;
        sqlx::query("UPDATE site SET status = ?, status_time = ?, last_error = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now())
            .bind(last_error)
            .bind(site_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Mark every INDEXING site as FAILED, used after an unclean shutdown / 启动时标记中断的站点
    pub async fn fail_interrupted_sites(&self, reason: &str) -> Result<u64, sqlx::Error> {
        let _gate = self.lock_writes().await;
        let result = sqlx::query(
            "UPDATE site SET status = ?, status_time = ?, last_error = ? WHERE status = ?",
        )
        .bind(SiteStatus::Failed.as_str())
        .bind(now())
        .bind(reason)
        .bind(SiteStatus::Indexing.as_str())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_site_url_unique_case_insensitive() {
        let store = IndexStore::in_memory().await.unwrap();
        let first = store.reset_site("https://Example.com", "Example").await.unwrap();
        let second = store.reset_site("https://example.COM", "Example").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_sites().await.unwrap().len(), 1);

        let found = store.find_site_by_url("HTTPS://EXAMPLE.COM").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some(first.id));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let store = IndexStore::in_memory().await.unwrap();
        let site = store.reset_site("https://example.com", "Example").await.unwrap();
        assert_eq!(site.status, SiteStatus::Indexing);

        store
            .set_site_status(site.id, SiteStatus::Failed, Some("boom"))
            .await
            .unwrap();
        let failed = store.get_site(site.id).await.unwrap().unwrap();
        assert_eq!(failed.status, SiteStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("boom"));

        // A fresh reset re-enters INDEXING and clears the error
        let again = store.reset_site("https://example.com", "Example").await.unwrap();
        let reloaded = store.get_site(again.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SiteStatus::Indexing);
        assert!(reloaded.last_error.is_none());
    }

    #[tokio::test]
    async fn test_fail_interrupted_sites() {
        let store = IndexStore::in_memory().await.unwrap();
        store.reset_site("https://a.example", "A").await.unwrap();
        let b = store.reset_site("https://b.example", "B").await.unwrap();
        store.set_site_status(b.id, SiteStatus::Indexed, None).await.unwrap();

        let changed = store.fail_interrupted_sites("interrupted").await.unwrap();
        assert_eq!(changed, 1);
        let b = store.get_site(b.id).await.unwrap().unwrap();
        assert_eq!(b.status, SiteStatus::Indexed);
    }
}
