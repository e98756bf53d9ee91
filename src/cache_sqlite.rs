//! SQLite-backed [`CacheStore`].
//!
//! Records are stored as JSON in `cached_records`, keyed by
//! `(category, id)`; the sources that delivered each record live in
//! `record_sources`. Reads return records in insertion order.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use passage_core::cache::{CacheStats, CacheStore, CachedRecord};
use passage_core::models::ContentRecord;

use crate::{db, migrate};

pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `path` and make sure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn sources_for(&self, category: &str) -> Result<HashMap<String, BTreeSet<String>>> {
        let rows = sqlx::query("SELECT record_id, source FROM record_sources WHERE category = ?")
            .bind(category)
            .fetch_all(&self.pool)
            .await?;
        let mut sources: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in rows {
            let record_id: String = row.try_get("record_id")?;
            let source: String = row.try_get("source")?;
            sources.entry(record_id).or_default().insert(source);
        }
        Ok(sources)
    }
}

fn decode(record_json: &str) -> Result<ContentRecord> {
    serde_json::from_str(record_json).with_context(|| "Corrupt cached record JSON")
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get_records(&self, category: &str) -> Result<Vec<CachedRecord>> {
        let rows = sqlx::query(
            "SELECT id, record_json FROM cached_records WHERE category = ? ORDER BY rowid",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        let mut sources = self.sources_for(category).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let record_json: String = row.try_get("record_json")?;
            out.push(CachedRecord {
                record: decode(&record_json)?,
                sources: sources.remove(&id).unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn get_record(&self, category: &str, id: &str) -> Result<Option<CachedRecord>> {
        let row = sqlx::query("SELECT record_json FROM cached_records WHERE category = ? AND id = ?")
            .bind(category)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let record_json: String = row.try_get("record_json")?;

        let source_rows =
            sqlx::query("SELECT source FROM record_sources WHERE category = ? AND record_id = ?")
                .bind(category)
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        let sources = source_rows
            .iter()
            .map(|r| r.try_get::<String, _>("source"))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Some(CachedRecord {
            record: decode(&record_json)?,
            sources,
        }))
    }

    async fn put_record(&self, record: &ContentRecord, source: &str) -> Result<()> {
        let category = record.category();
        let record_json = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO cached_records
                (category, id, author, kind, created_at, record_json, cached_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&category)
        .bind(&record.id)
        .bind(&record.author)
        .bind(record.kind as i64)
        .bind(record.created_at)
        .bind(&record_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO record_sources (category, record_id, source) VALUES (?, ?, ?)",
        )
        .bind(&category)
        .bind(&record.id)
        .bind(source)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM record_sources")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cached_records")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS n FROM cached_records GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut stats = CacheStats::default();
        for row in rows {
            let category: String = row.try_get("category")?;
            let n: i64 = row.try_get("n")?;
            stats.records += n as usize;
            stats.per_category.insert(category, n as usize);
        }
        Ok(stats)
    }
}
