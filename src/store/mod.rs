//! SQLite persistence for sites, pages, lemmas and the inverted index / 数据库存储
//!
//! - One pool, WAL mode, busy_timeout (concurrent readers)
//! - Every write goes through a single async write gate (SQLite has one writer)
//! - A page and its index entries are written in one transaction / 单页写入为一个事务

mod page;
mod query;
mod schema;
mod site;

pub use page::PageWriteUnit;
pub use query::PageHit;
use schema::run_migrations;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Index database handle, cheap to clone / 索引数据库
#[derive(Clone)]
pub struct IndexStore {
    db: Pool<Sqlite>,
    write_gate: Arc<Mutex<()>>,
}

impl IndexStore {
    /// Open a pool and apply per-connection pragmas / 打开连接池
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(true);

        // In-memory databases live as long as their connection, so never recycle it
        let db = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        tracing::info!("Index database opened: {} ({} connections)", database_url, max_connections);
        Ok(Self::new(db))
    }

    /// In-memory store with the schema applied / 内存数据库（测试用）
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let store = Self::connect("sqlite::memory:", 1).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Use an existing pool / 使用现有连接池
    fn new(db: Pool<Sqlite>) -> Self {
        Self {
            db,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        run_migrations(&self.db).await
    }

    /// Close database connection pool / 关闭数据库连接池
    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn lock_writes(&self) -> OwnedMutexGuard<()> {
        self.write_gate.clone().lock_owned().await
    }

    /// Start an atomic page write; holds the write gate until commit or drop / 开始单页写入
    pub async fn begin_page_write(&self) -> Result<PageWriteUnit, sqlx::Error> {
        let guard = self.lock_writes().await;
        let tx = self.db.begin().await?;
        Ok(PageWriteUnit::new(guard, tx))
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
