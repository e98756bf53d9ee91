//! In-memory [`CacheStore`] for tests and WASM targets.
//!
//! Categories map to insertion-ordered record lists behind
//! `std::sync::RwLock`.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::ContentRecord;

use super::{CacheStats, CachedRecord, CacheStore};

#[derive(Default)]
struct Category {
    records: Vec<CachedRecord>,
    by_id: HashMap<String, usize>,
}

/// In-memory cache.
pub struct InMemoryCache {
    categories: RwLock<HashMap<String, Category>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            categories: RwLock::new(HashMap::new()),
        }
    }

    /// Pre-populated cache, every record attributed to `source`.
    pub fn with_records(records: impl IntoIterator<Item = ContentRecord>, source: &str) -> Self {
        let cache = Self::new();
        if let Ok(mut categories) = cache.categories.write() {
            for record in records {
                insert(&mut categories, &record, source);
            }
        }
        cache
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory cache lock poisoned")
}

fn insert(categories: &mut HashMap<String, Category>, record: &ContentRecord, source: &str) {
    let category = categories.entry(record.category()).or_default();
    match category.by_id.get(&record.id) {
        Some(&i) => {
            category.records[i].sources.insert(source.to_string());
        }
        None => {
            category.by_id.insert(record.id.clone(), category.records.len());
            category.records.push(CachedRecord {
                record: record.clone(),
                sources: BTreeSet::from([source.to_string()]),
            });
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get_records(&self, category: &str) -> Result<Vec<CachedRecord>> {
        let categories = self.categories.read().map_err(poisoned)?;
        Ok(categories
            .get(category)
            .map(|c| c.records.clone())
            .unwrap_or_default())
    }

    async fn get_record(&self, category: &str, id: &str) -> Result<Option<CachedRecord>> {
        let categories = self.categories.read().map_err(poisoned)?;
        Ok(categories
            .get(category)
            .and_then(|c| c.by_id.get(id).map(|&i| c.records[i].clone())))
    }

    async fn put_record(&self, record: &ContentRecord, source: &str) -> Result<()> {
        let mut categories = self.categories.write().map_err(poisoned)?;
        insert(&mut categories, record, source);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.categories.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let categories = self.categories.read().map_err(poisoned)?;
        let mut stats = CacheStats::default();
        for (name, category) in categories.iter() {
            stats.records += category.records.len();
            stats
                .per_category
                .insert(name.clone(), category.records.len());
        }
        Ok(stats)
    }
}
