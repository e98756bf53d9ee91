//! Cache abstraction for Passage.
//!
//! The [`CacheStore`] trait is a key-value store keyed by content category
//! (a record kind rendered as a decimal string). The search engine consults
//! it first through [`lookup`] and treats it as one more source with zero
//! latency: cached records go through the same dedup and match validation
//! as live ones.
//!
//! The engine only reads. Writes come from an explicit cache warmer in the
//! application crate (or `put_record` in tests), and eviction is the
//! backend's business.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get_records`](CacheStore::get_records) | All records of a category |
//! | [`get_record`](CacheStore::get_record) | One record by id |
//! | [`put_record`](CacheStore::put_record) | Insert or merge, noting the delivering source |
//! | [`clear_all`](CacheStore::clear_all) | Drop everything |
//! | [`stats`](CacheStore::stats) | Counts per category |

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::ContentRecord;

/// A cached record plus the sources known to have served it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedRecord {
    pub record: ContentRecord,
    pub sources: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub records: usize,
    pub per_category: BTreeMap<String, usize>,
}

/// Abstract cache backend.
///
/// Implementations must be `Send + Sync`; reads are awaitable even when the
/// backing store answers synchronously.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_records(&self, category: &str) -> Result<Vec<CachedRecord>>;

    async fn get_record(&self, category: &str, id: &str) -> Result<Option<CachedRecord>>;

    /// Store `record` under its category. Storing an id that already exists
    /// adds `source` to its known sources.
    async fn put_record(&self, record: &ContentRecord, source: &str) -> Result<()>;

    async fn clear_all(&self) -> Result<()>;

    async fn stats(&self) -> Result<CacheStats>;
}

/// Cached records of `category` accepted by `predicate`.
pub async fn lookup<F>(
    cache: &dyn CacheStore,
    category: &str,
    predicate: F,
) -> Result<Vec<CachedRecord>>
where
    F: Fn(&ContentRecord) -> bool + Send,
{
    let records = cache.get_records(category).await?;
    Ok(records.into_iter().filter(|c| predicate(&c.record)).collect())
}
