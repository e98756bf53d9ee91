//! Source transport abstraction and the live source registry.
//!
//! A [`Source`] receives the compiled filters and pushes matching records
//! into a [`RecordSink`]. Returning `Ok(())` is the end-of-stream signal;
//! returning `Err` is a source failure. Either way the orchestrator counts
//! the source as complete.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               SourceRegistry                 │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐  │
//! │  │  Memory  │ │   File   │ │     HTTP     │  │
//! │  │ (tests)  │ │ (JSONL)  │ │ (POST query) │  │
//! │  └──────────┘ └──────────┘ └──────────────┘  │
//! └──────────────┬───────────────────────────────┘
//!                ▼ watch channel
//!         Orchestrator::query() → FanoutEvent stream
//! ```
//!
//! The registry is a `tokio::sync::watch` channel, so an attempt in flight
//! sees sources registered after it started.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use passage_core::models::{ContentRecord, Filter};

use crate::fanout::FanoutEvent;

// ═══════════════════════════════════════════════════════════════════════
// Source Trait
// ═══════════════════════════════════════════════════════════════════════

/// An independent, possibly unreliable record provider.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use passage::source::{RecordSink, Source};
/// use passage_core::models::Filter;
///
/// struct Empty;
///
/// #[async_trait]
/// impl Source for Empty {
///     fn id(&self) -> &str { "empty" }
///
///     async fn query(&self, _filters: &[Filter], _sink: RecordSink) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable identifier, unique within a registry.
    fn id(&self) -> &str;

    /// Short transport label for listings (`"file"`, `"http"`, ...).
    fn kind(&self) -> &str {
        "custom"
    }

    /// Stream records for `filters` into `sink`, then return.
    async fn query(&self, filters: &[Filter], sink: RecordSink) -> Result<()>;
}

/// Delivery end handed to a [`Source`] for one attempt.
///
/// Records are tagged with the source id on the way out. Once the attempt
/// is cancelled (or its consumer is gone), [`send`](RecordSink::send)
/// returns `false` and sources should stop producing.
pub struct RecordSink {
    source: String,
    tx: mpsc::UnboundedSender<FanoutEvent>,
    cancel: CancellationToken,
    delivered: Arc<AtomicUsize>,
}

impl RecordSink {
    pub(crate) fn new(
        source: String,
        tx: mpsc::UnboundedSender<FanoutEvent>,
        cancel: CancellationToken,
        delivered: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            source,
            tx,
            cancel,
            delivered,
        }
    }

    /// Push one record downstream. Returns `false` when delivery has stopped.
    pub fn send(&self, record: ContentRecord) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let event = FanoutEvent::Record {
            source: self.source.clone(),
            record,
        };
        if self.tx.send(event).is_err() {
            return false;
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    pub fn source_id(&self) -> &str {
        &self.source
    }
}

/// Records accepted by at least one filter, honouring each filter's limit.
///
/// Used by transports that hold records in process. Input order is kept.
pub fn select<'a>(records: &'a [ContentRecord], filters: &[Filter]) -> Vec<&'a ContentRecord> {
    let mut picked: HashSet<usize> = HashSet::new();
    for filter in filters {
        let limit = filter.limit.unwrap_or(usize::MAX);
        let hits = records
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.matches(r))
            .take(limit)
            .map(|(i, _)| i);
        picked.extend(hits);
    }
    records
        .iter()
        .enumerate()
        .filter(|(i, _)| picked.contains(i))
        .map(|(_, r)| r)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// The set of known sources, observable for changes.
///
/// Cloning shares the same underlying set.
#[derive(Clone)]
pub struct SourceRegistry {
    tx: Arc<watch::Sender<Vec<Arc<dyn Source>>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }

    /// Add a source. A source with the same id is replaced.
    pub fn register(&self, source: Arc<dyn Source>) {
        self.tx.send_modify(|sources| {
            match sources.iter().position(|s| s.id() == source.id()) {
                Some(i) => sources[i] = source,
                None => sources.push(source),
            }
        });
    }

    /// Remove a source by id. Attempts that already queried it are unaffected.
    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        self.tx.send_if_modified(|sources| {
            let before = sources.len();
            sources.retain(|s| s.id() != id);
            removed = sources.len() != before;
            removed
        });
        removed
    }

    pub fn known_sources(&self) -> Vec<Arc<dyn Source>> {
        self.tx.borrow().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tx.borrow().iter().map(|s| s.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Arc<dyn Source>>> {
        self.tx.subscribe()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// In-process source
// ═══════════════════════════════════════════════════════════════════════

/// What a [`MemorySource`] does after delivering its records.
#[derive(Debug, Clone)]
enum Ending {
    Complete,
    Fail(String),
    Hang,
}

/// In-process source over a fixed record list, with latency and failure
/// injection.
pub struct MemorySource {
    id: String,
    records: Vec<ContentRecord>,
    initial_delay: Option<Duration>,
    per_record_delay: Option<Duration>,
    ending: Ending,
    queries: AtomicUsize,
}

impl MemorySource {
    pub fn new(id: impl Into<String>, records: Vec<ContentRecord>) -> Self {
        Self {
            id: id.into(),
            records,
            initial_delay: None,
            per_record_delay: None,
            ending: Ending::Complete,
            queries: AtomicUsize::new(0),
        }
    }

    /// Wait before the first record.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Wait before every record.
    pub fn with_record_delay(mut self, delay: Duration) -> Self {
        self.per_record_delay = Some(delay);
        self
    }

    /// Deliver matching records, then fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.ending = Ending::Fail(message.into());
        self
    }

    /// Deliver matching records, then never signal end-of-stream.
    pub fn hanging(mut self) -> Self {
        self.ending = Ending::Hang;
        self
    }

    /// How many times this source has been queried.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "memory"
    }

    async fn query(&self, filters: &[Filter], sink: RecordSink) -> Result<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.initial_delay {
            tokio::time::sleep(delay).await;
        }
        for record in select(&self.records, filters) {
            if let Some(delay) = self.per_record_delay {
                tokio::time::sleep(delay).await;
            }
            if !sink.send(record.clone()) {
                return Ok(());
            }
        }
        match &self.ending {
            Ending::Complete => Ok(()),
            Ending::Fail(message) => bail!("{}", message),
            Ending::Hang => std::future::pending().await,
        }
    }
}
