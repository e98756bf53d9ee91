use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the cache schema at `[cache].path`.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let Some(path) = &config.cache.path else {
        bail!("cache.path is not set; nothing to initialize (the cache is in-memory)");
    };
    let pool = db::connect(path).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation on an open pool.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // One row per record id within a category
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cached_records (
            category TEXT NOT NULL,
            id TEXT NOT NULL,
            author TEXT NOT NULL,
            kind INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            record_json TEXT NOT NULL,
            cached_at INTEGER NOT NULL,
            PRIMARY KEY (category, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Which sources delivered each record
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_sources (
            category TEXT NOT NULL,
            record_id TEXT NOT NULL,
            source TEXT NOT NULL,
            PRIMARY KEY (category, record_id, source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cached_records_author ON cached_records(author)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
