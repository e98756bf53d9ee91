//! Cache statistics and maintenance.
//!
//! Backs `psg cache stats` and `psg cache clear`. Both operate on the
//! SQLite cache at `[cache].path`; with no path configured the cache lives
//! only for the duration of one process and there is nothing to report.

use anyhow::{bail, Result};
use sqlx::Row;

use passage_core::cache::CacheStore;

use crate::cache_sqlite::SqliteCache;
use crate::config::Config;
use crate::db;

/// Per-source breakdown of cached records.
struct SourceStats {
    source: String,
    record_count: i64,
}

/// Print record counts per category and per delivering source.
pub async fn run_cache_stats(config: &Config) -> Result<()> {
    let Some(path) = &config.cache.path else {
        bail!("cache.path is not set; the cache is in-memory and not persisted");
    };

    let cache = SqliteCache::open(path).await?;
    let stats = cache.stats().await?;

    let pool = db::connect(path).await?;
    let rows = sqlx::query(
        r#"
        SELECT source, COUNT(*) AS record_count
        FROM record_sources
        GROUP BY source
        ORDER BY record_count DESC, source
        "#,
    )
    .fetch_all(&pool)
    .await?;
    pool.close().await;

    let mut by_source = Vec::with_capacity(rows.len());
    for row in &rows {
        by_source.push(SourceStats {
            source: row.try_get("source")?,
            record_count: row.try_get("record_count")?,
        });
    }

    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    println!("Passage Cache Stats");
    println!("===================");
    println!();
    println!("  Cache:       {}", path.display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Records:     {}", stats.records);

    if !stats.per_category.is_empty() {
        println!();
        println!("  By kind:");
        for (category, count) in &stats.per_category {
            println!("  {:<24} {:>8}", category, count);
        }
    }

    if !by_source.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<24} {:>8}", "SOURCE", "RECORDS");
        println!("  {}", "-".repeat(33));
        for s in &by_source {
            println!("  {:<24} {:>8}", s.source, s.record_count);
        }
    }
    println!();

    Ok(())
}

pub async fn run_cache_clear(config: &Config) -> Result<()> {
    let Some(path) = &config.cache.path else {
        bail!("cache.path is not set; the cache is in-memory and not persisted");
    };
    let cache = SqliteCache::open(path).await?;
    let before = cache.stats().await?.records;
    cache.clear_all().await?;
    println!("Cleared {} cached records.", before);
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
