//! Addressable-record deduplication and provenance bookkeeping.
//!
//! A [`ResultSet`] holds at most one record per [`RecordKey`]
//! `(author, kind, identifier)`. Merges follow latest-wins:
//!
//! | Existing vs incoming `created_at` | Outcome |
//! |-----------------------------------|---------|
//! | no existing record | insert, changed |
//! | incoming strictly newer | replace in place, changed iff ids differ |
//! | equal | keep existing, unchanged |
//! | incoming older | discard, unchanged |
//!
//! The rule holds for every merge, so the final content is independent of
//! delivery order. Display order is decided later by ranking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::models::{ContentRecord, RecordKey};

/// Deduplicated records of one query attempt.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    records: Vec<ContentRecord>,
    index: HashMap<RecordKey, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ContentRecord] {
        &self.records
    }

    pub fn get(&self, key: &RecordKey) -> Option<&ContentRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// Merge one record under latest-wins. Returns whether the set changed.
    pub fn insert_if_newer(&mut self, record: ContentRecord) -> bool {
        let key = record.key();
        match self.index.get(&key) {
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
                true
            }
            Some(&i) => {
                let existing = &mut self.records[i];
                if record.created_at > existing.created_at {
                    let changed = existing.id != record.id;
                    *existing = record;
                    changed
                } else {
                    false
                }
            }
        }
    }

    /// Immutable view of the current contents.
    pub fn snapshot(&self) -> Arc<[ContentRecord]> {
        Arc::from(self.records.as_slice())
    }

    pub fn into_records(self) -> Vec<ContentRecord> {
        self.records
    }
}

/// Free-function form of [`ResultSet::insert_if_newer`].
pub fn insert_if_newer(set: &mut ResultSet, record: ContentRecord) -> bool {
    set.insert_if_newer(record)
}

/// Which sources returned which record ids.
///
/// Diagnostic only; never consulted for ranking. Duplicate and out-of-order
/// deliveries are absorbed by the set semantics.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    seen: HashMap<String, BTreeSet<String>>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `source` returned `record_id`. Returns true the first time
    /// this pair is seen.
    pub fn record(&mut self, record_id: &str, source: &str) -> bool {
        self.seen
            .entry(record_id.to_string())
            .or_default()
            .insert(source.to_string())
    }

    pub fn extend<'a>(&mut self, record_id: &str, sources: impl IntoIterator<Item = &'a String>) {
        let entry = self.seen.entry(record_id.to_string()).or_default();
        entry.extend(sources.into_iter().cloned());
    }

    pub fn sources(&self, record_id: &str) -> Option<&BTreeSet<String>> {
        self.seen.get(record_id)
    }

    /// Number of distinct record ids seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
