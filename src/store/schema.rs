use sqlx::SqlitePool;

/// Run database migrations / 运行数据库迁移
///
/// Only creates what is missing; existing data is kept / 只在表不存在时创建
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS site (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL UNIQUE COLLATE NOCASE,
            name TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('INDEXING', 'INDEXED', 'FAILED')),
            status_time TEXT NOT NULL,
            last_error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS page (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL,
            path TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            UNIQUE (site_id, path),
            FOREIGN KEY (site_id) REFERENCES site(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lemma (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            frequency INTEGER NOT NULL DEFAULT 0,
            UNIQUE (site_id, text),
            FOREIGN KEY (site_id) REFERENCES site(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS site_index (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id INTEGER NOT NULL,
            lemma_id INTEGER NOT NULL,
            rank_value REAL NOT NULL CHECK (rank_value >= 0.0 AND rank_value <= 1.0),
            UNIQUE (page_id, lemma_id),
            FOREIGN KEY (page_id) REFERENCES page(id) ON DELETE CASCADE,
            FOREIGN KEY (lemma_id) REFERENCES lemma(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Lookup by lemma text across sites / 按词元查询
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lemma_text ON lemma(text)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_site_index_lemma ON site_index(lemma_id)")
        .execute(pool)
        .await?;

    Ok(())
}
