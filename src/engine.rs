//! Search engine: fallback and ranking controller.
//!
//! [`SearchEngine::search`] parses the raw query, then drives one or two
//! query attempts and reports progress on a channel of [`SearchUpdate`]s.
//!
//! # Pipeline
//!
//! ```text
//! parse ─▶ compile ─▶ cache gate ─┐
//!                                 ├─▶ dedup ─▶ validate ─▶ debounced Snapshot
//!              fan-out (sources) ─┘
//!                      │
//!                      ▼ AllComplete
//!          empty && version requested? ──yes──▶ fallback attempt (no version)
//!                      │ no                              │
//!                      ▼                                 ▼
//!                    rank ◀──────────────────────────────┘
//!                      │
//!                      ▼ optional verification ─▶ Ranked
//! ```
//!
//! # States
//!
//! | From | To | When |
//! |------|----|------|
//! | `Searching` | `AwaitingCompletion` | filters dispatched |
//! | `AwaitingCompletion` | `Satisfied` | all sources done, results non-empty or no version requested |
//! | `AwaitingCompletion` | `VersionFallback` | all sources done, results empty, version requested |
//! | `VersionFallback` | `Ranked` | fallback attempt done; its results replace the original |
//! | `Satisfied` | `Ranked` | ranking applied |
//!
//! Starting a new search cancels the previous one before any new filter is
//! issued. Every update is guarded by "is this still the active search", so
//! nothing from a superseded search reaches its caller after cancellation.
//! All result-set and provenance mutation happens inside the one task that
//! owns the search.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use passage_core::cache::memory::InMemoryCache;
use passage_core::cache::{lookup, CacheStore};
use passage_core::catalog::Catalog;
use passage_core::compile::CompileOptions;
use passage_core::dedup::{Provenance, ResultSet};
use passage_core::models::{category_for_kind, ContentRecord, ParsedQuery, DEFAULT_CONTENT_KIND};
use passage_core::rank::{rank, NoTrust, RankedRecord, TrustScores};

use crate::cache_sqlite::SqliteCache;
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::fanout::{FanoutEvent, Orchestrator};
use crate::source::SourceRegistry;
use crate::sources::registry_from_config;
use crate::trust::SharedTrustScores;
use crate::verify::{verify_all, HttpVerifier, Verification, Verifier};
use crate::warm::CacheWarmer;

// ═══════════════════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Book type used when a search does not name one.
    pub book_type: String,
    /// Record kind requested from sources and the cache.
    pub kind: u32,
    pub debounce: Duration,
    pub source_timeout: Duration,
    pub max_results: usize,
    pub verification_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            book_type: "bible".to_string(),
            kind: DEFAULT_CONTENT_KIND,
            debounce: Duration::from_millis(500),
            source_timeout: Duration::from_secs(10),
            max_results: 50,
            verification_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            book_type: config.search.book_type.clone(),
            kind: config.search.kind,
            debounce: config.search.debounce(),
            source_timeout: config.search.source_timeout(),
            max_results: config.search.max_results,
            verification_timeout: config
                .verification
                .as_ref()
                .map(|v| Duration::from_secs(v.timeout_secs))
                .unwrap_or(Duration::from_secs(10)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Searching,
    AwaitingCompletion,
    Satisfied,
    VersionFallback,
    Ranked,
}

/// Bookkeeping for one query attempt.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAttempt {
    pub id: Uuid,
    pub query: ParsedQuery,
    pub started_at: DateTime<Utc>,
    /// Source ids in the order they were queried.
    pub sources_queried: Vec<String>,
    pub sources_completed: usize,
    pub sources_failed: Vec<String>,
    /// Completed empty while an edition was requested.
    pub version_not_found: bool,
    pub fallback: bool,
}

/// Immutable view of an attempt's validated records, in merge order.
#[derive(Debug, Clone)]
pub struct ResultSnapshot {
    pub attempt: Uuid,
    pub fallback: bool,
    pub records: Arc<[ContentRecord]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub ranked: RankedRecord,
    /// Sources that delivered this record (diagnostic).
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub search_id: Uuid,
    /// The query as parsed, including any edition constraint.
    pub query: ParsedQuery,
    pub book_type: String,
    /// True when the edition constraint was dropped.
    pub fallback: bool,
    /// The attempt whose results were ranked.
    pub attempt: QueryAttempt,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone)]
pub enum SearchUpdate {
    /// The input held no recognizable reference.
    NothingToSearch,
    PhaseChanged(Phase),
    /// The current validated result set, debounced.
    Snapshot(ResultSnapshot),
    /// The requested editions produced nothing; retrying without them.
    Fallback { dropped_versions: Vec<String> },
    /// Final ranked results. Always the last update of a search.
    Ranked(SearchOutcome),
}

/// Caller's end of one search.
pub struct SearchHandle {
    id: Uuid,
    updates: mpsc::UnboundedReceiver<SearchUpdate>,
    cancel: CancellationToken,
}

impl SearchHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn next(&mut self) -> Option<SearchUpdate> {
        self.updates.recv().await
    }

    /// Stop the search. Idempotent; a no-op once it has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Skip intermediate updates and wait for the ranked outcome.
    ///
    /// `None` when nothing was searched or the search was cancelled.
    pub async fn outcome(mut self) -> Option<SearchOutcome> {
        while let Some(update) = self.next().await {
            match update {
                SearchUpdate::Ranked(outcome) => return Some(outcome),
                SearchUpdate::NothingToSearch => return None,
                _ => {}
            }
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════

struct ActiveSearch {
    id: Uuid,
    cancel: CancellationToken,
}

struct Inner {
    options: EngineOptions,
    catalog: Arc<Catalog>,
    cache: Arc<dyn CacheStore>,
    orchestrator: Orchestrator,
    trust: Arc<dyn TrustScores>,
    verifier: Option<Arc<dyn Verifier>>,
    warmer: Option<CacheWarmer>,
    active: Mutex<Option<ActiveSearch>>,
}

impl Inner {
    fn with_active<R>(&self, f: impl FnOnce(&mut Option<ActiveSearch>) -> R) -> R {
        let mut guard = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn is_active(&self, id: Uuid) -> bool {
        self.with_active(|active| active.as_ref().is_some_and(|a| a.id == id))
    }

    fn release(&self, id: Uuid) {
        self.with_active(|active| {
            if active.as_ref().is_some_and(|a| a.id == id) {
                *active = None;
            }
        });
    }
}

/// Cheap to clone; clones share the active-search slot.
#[derive(Clone)]
pub struct SearchEngine {
    inner: Arc<Inner>,
}

pub struct SearchEngineBuilder {
    options: EngineOptions,
    catalog: Catalog,
    cache: Arc<dyn CacheStore>,
    registry: SourceRegistry,
    trust: Arc<dyn TrustScores>,
    verifier: Option<Arc<dyn Verifier>>,
    write_through: bool,
}

impl SearchEngineBuilder {
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn trust(mut self, trust: Arc<dyn TrustScores>) -> Self {
        self.trust = trust;
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Store live records in the cache as they arrive.
    pub fn write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }

    /// Finish. Spawns the cache warmer when write-through is on, so this
    /// must run inside a tokio runtime in that case.
    pub fn build(self) -> SearchEngine {
        let warmer = self
            .write_through
            .then(|| CacheWarmer::spawn(self.cache.clone()));
        SearchEngine {
            inner: Arc::new(Inner {
                orchestrator: Orchestrator::new(self.registry, self.options.source_timeout),
                options: self.options,
                catalog: Arc::new(self.catalog),
                cache: self.cache,
                trust: self.trust,
                verifier: self.verifier,
                warmer,
                active: Mutex::new(None),
            }),
        }
    }
}

impl SearchEngine {
    /// Defaults: built-in catalog, empty in-memory cache, no sources,
    /// zero trust for everyone, no verification.
    pub fn builder(options: EngineOptions) -> SearchEngineBuilder {
        SearchEngineBuilder {
            options,
            catalog: Catalog::with_defaults(),
            cache: Arc::new(InMemoryCache::new()),
            registry: SourceRegistry::new(),
            trust: Arc::new(NoTrust),
            verifier: None,
            write_through: false,
        }
    }

    /// Assemble an engine from configuration: cache backend, sources,
    /// catalog extensions, trust scores, and verification.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let cache: Arc<dyn CacheStore> = match &config.cache.path {
            Some(path) => Arc::new(SqliteCache::open(path).await?),
            None => Arc::new(InMemoryCache::new()),
        };
        let mut builder = Self::builder(EngineOptions::from_config(config))
            .catalog(config.build_catalog())
            .cache(cache)
            .registry(registry_from_config(config))
            .trust(Arc::new(SharedTrustScores::from_config(&config.trust)))
            .write_through(config.cache.write_through);
        if let Some(verification) = &config.verification {
            builder = builder.verifier(Arc::new(HttpVerifier::from_config(verification)?));
        }
        Ok(builder.build())
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.inner.cache
    }

    pub fn registry(&self) -> &SourceRegistry {
        self.inner.orchestrator.registry()
    }

    /// A handle sharing this engine's cache, sources, and trust scores but
    /// with its own active-search slot, so its searches neither cancel nor
    /// are cancelled by searches on `self`.
    pub fn detached(&self) -> SearchEngine {
        let inner = &self.inner;
        SearchEngine {
            inner: Arc::new(Inner {
                options: inner.options.clone(),
                catalog: inner.catalog.clone(),
                cache: inner.cache.clone(),
                orchestrator: inner.orchestrator.clone(),
                trust: inner.trust.clone(),
                verifier: inner.verifier.clone(),
                warmer: inner.warmer.clone(),
                active: Mutex::new(None),
            }),
        }
    }

    /// Wait for pending write-through cache writes.
    pub async fn flush_cache_writes(&self) {
        if let Some(warmer) = &self.inner.warmer {
            warmer.flush().await;
        }
    }

    /// Start a search, cancelling whichever search was active.
    ///
    /// `book_type` defaults to the configured one. Must be called inside a
    /// tokio runtime.
    pub fn search(&self, raw: &str, book_type: Option<&str>) -> SearchHandle {
        let book_type = book_type
            .map(str::to_string)
            .unwrap_or_else(|| self.inner.options.book_type.clone());
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        let previous = self.inner.with_active(|active| {
            active.replace(ActiveSearch {
                id,
                cancel: cancel.clone(),
            })
        });
        if let Some(previous) = previous {
            debug!(search = %previous.id, "cancelling superseded search");
            previous.cancel.cancel();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Emitter {
            id,
            tx,
            cancel: cancel.clone(),
            inner: self.inner.clone(),
        };

        match self.inner.catalog.parse(raw, &book_type) {
            None => {
                info!(search = %id, query = %raw, "no recognizable reference");
                emitter.emit(SearchUpdate::NothingToSearch);
                self.inner.release(id);
            }
            Some(query) => {
                tokio::spawn(run_search(emitter, query, book_type));
            }
        }

        SearchHandle {
            id,
            updates: rx,
            cancel,
        }
    }

    /// Cancel whichever search is active.
    pub fn cancel_active(&self) {
        if let Some(active) = self.inner.with_active(Option::take) {
            active.cancel.cancel();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Search driver
// ═══════════════════════════════════════════════════════════════════════

/// Delivery end of a search, guarded by the active-search check.
struct Emitter {
    id: Uuid,
    tx: mpsc::UnboundedSender<SearchUpdate>,
    cancel: CancellationToken,
    inner: Arc<Inner>,
}

impl Emitter {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && self.inner.is_active(self.id)
    }

    fn emit(&self, update: SearchUpdate) -> bool {
        if !self.is_live() {
            return false;
        }
        self.tx.send(update).is_ok()
    }
}

struct AttemptResult {
    set: ResultSet,
    provenance: Provenance,
    attempt: QueryAttempt,
}

async fn run_search(emitter: Emitter, query: ParsedQuery, book_type: String) {
    let inner = emitter.inner.clone();
    emitter.emit(SearchUpdate::PhaseChanged(Phase::Searching));

    let Some(first) = run_attempt(&inner, &emitter, &query, &book_type, false).await else {
        return;
    };

    let (chosen, fallback) = if first.attempt.version_not_found {
        let dropped_versions: Vec<String> = query
            .requested_versions()
            .into_iter()
            .map(str::to_string)
            .collect();
        info!(search = %emitter.id, versions = ?dropped_versions, "requested edition not found, retrying without it");
        emitter.emit(SearchUpdate::PhaseChanged(Phase::VersionFallback));
        emitter.emit(SearchUpdate::Fallback { dropped_versions });

        // The original empty set is discarded, not merged.
        let relaxed = query.without_version();
        match run_attempt(&inner, &emitter, &relaxed, &book_type, true).await {
            Some(second) => (second, true),
            None => return,
        }
    } else {
        emitter.emit(SearchUpdate::PhaseChanged(Phase::Satisfied));
        (first, false)
    };

    let AttemptResult {
        set,
        provenance,
        attempt,
    } = chosen;

    let mut ranked = rank(set.into_records(), inner.trust.as_ref());
    ranked.truncate(inner.options.max_results);

    let verification = match &inner.verifier {
        Some(verifier) => {
            let authors = ranked.iter().map(|r| r.record.author.clone());
            tokio::select! {
                _ = emitter.cancel.cancelled() => return,
                results = verify_all(verifier.clone(), authors, inner.options.verification_timeout) => Some(results),
            }
        }
        None => None,
    };

    let results = ranked
        .into_iter()
        .map(|ranked| SearchResult {
            sources: provenance
                .sources(&ranked.record.id)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
            verification: verification
                .as_ref()
                .and_then(|v| v.get(&ranked.record.author).copied()),
            ranked,
        })
        .collect::<Vec<_>>();

    info!(
        search = %emitter.id,
        results = results.len(),
        fallback,
        sources = attempt.sources_queried.len(),
        failed = attempt.sources_failed.len(),
        "search ranked"
    );

    let outcome = SearchOutcome {
        search_id: emitter.id,
        query,
        book_type,
        fallback,
        attempt,
        results,
    };
    emitter.emit(SearchUpdate::PhaseChanged(Phase::Ranked));
    emitter.emit(SearchUpdate::Ranked(outcome));
    inner.release(emitter.id);
}

/// One attempt: cache gate, fan-out, dedup, validation, debounced
/// snapshots. `None` when the search was cancelled.
async fn run_attempt(
    inner: &Inner,
    emitter: &Emitter,
    query: &ParsedQuery,
    book_type: &str,
    fallback: bool,
) -> Option<AttemptResult> {
    let opts = CompileOptions {
        kind: inner.options.kind,
        limit: None,
    };
    let filters = inner.catalog.compile(&opts, &query.references, book_type);

    let mut attempt = QueryAttempt {
        id: Uuid::new_v4(),
        query: query.clone(),
        started_at: Utc::now(),
        sources_queried: Vec::new(),
        sources_completed: 0,
        sources_failed: Vec::new(),
        version_not_found: false,
        fallback,
    };
    let mut set = ResultSet::new();
    let mut provenance = Provenance::new();
    let mut debouncer = Debouncer::new(inner.options.debounce);

    debug!(search = %emitter.id, attempt = %attempt.id, filters = filters.len(), fallback, "attempt started");

    // Cache first; its records take the same dedup and validation path.
    let category = category_for_kind(inner.options.kind);
    match lookup(inner.cache.as_ref(), &category, |r| {
        filters.iter().any(|f| f.matches(r))
    })
    .await
    {
        Ok(hits) => {
            for hit in hits {
                let record = hit.record.with_computed_id();
                provenance.extend(&record.id, &hit.sources);
                if !inner.catalog.matches(&record, query, book_type) {
                    trace!(record = %record.id, "cached record does not match query");
                    continue;
                }
                if set.insert_if_newer(record) {
                    debouncer.touch();
                }
            }
        }
        Err(e) => warn!(error = %e, "cache lookup failed"),
    }

    if !emitter.is_live() {
        return None;
    }

    let (fanout, mut events) = inner
        .orchestrator
        .query_with_token(filters, emitter.cancel.child_token());
    if !fallback {
        emitter.emit(SearchUpdate::PhaseChanged(Phase::AwaitingCompletion));
    }

    loop {
        tokio::select! {
            biased;
            _ = emitter.cancel.cancelled() => {
                fanout.cancel();
                return None;
            }
            event = events.recv() => match event {
                Some(FanoutEvent::Record { source, record }) => {
                    let record = record.with_computed_id();
                    provenance.record(&record.id, &source);
                    if let Some(warmer) = &inner.warmer {
                        warmer.offer(&source, &record);
                    }
                    if !inner.catalog.matches(&record, query, book_type) {
                        trace!(record = %record.id, source = %source, "record does not match query");
                        continue;
                    }
                    if set.insert_if_newer(record) {
                        debouncer.touch();
                    }
                }
                Some(FanoutEvent::SourceComplete { .. }) => {
                    attempt.sources_completed += 1;
                }
                Some(FanoutEvent::AllComplete { queried, failed }) => {
                    attempt.sources_queried = queried;
                    attempt.sources_failed = failed;
                    break;
                }
                None => {
                    if !emitter.is_live() {
                        return None;
                    }
                    break;
                }
            },
            _ = debouncer.ready() => {
                emit_snapshot(emitter, &attempt, &set);
            }
        }
    }

    // Anything still waiting on the debounce window goes out now.
    if debouncer.flush() {
        emit_snapshot(emitter, &attempt, &set);
    }

    attempt.version_not_found = set.is_empty() && query.has_version_constraint();
    debug!(
        search = %emitter.id,
        attempt = %attempt.id,
        records = set.len(),
        version_not_found = attempt.version_not_found,
        "attempt complete"
    );

    Some(AttemptResult {
        set,
        provenance,
        attempt,
    })
}

fn emit_snapshot(emitter: &Emitter, attempt: &QueryAttempt, set: &ResultSet) {
    emitter.emit(SearchUpdate::Snapshot(ResultSnapshot {
        attempt: attempt.id,
        fallback: attempt.fallback,
        records: set.snapshot(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use passage_core::models::{Tags, TAG_BOOK, TAG_CHAPTER, TAG_IDENTIFIER, TAG_TYPE, TAG_VERSE, TAG_VERSION};

    fn verse(author: &str, d: &str, ts: i64, version: &str) -> ContentRecord {
        ContentRecord {
            id: String::new(),
            author: author.into(),
            created_at: ts,
            kind: DEFAULT_CONTENT_KIND,
            tags: Tags::new()
                .with(TAG_IDENTIFIER, d)
                .with(TAG_TYPE, "bible")
                .with(TAG_BOOK, "John")
                .with(TAG_CHAPTER, "3")
                .with(TAG_VERSE, "16")
                .with(TAG_VERSION, version),
            content: format!("{} {}", d, version),
        }
        .with_computed_id()
    }

    fn options() -> EngineOptions {
        EngineOptions {
            debounce: Duration::from_millis(20),
            ..EngineOptions::default()
        }
    }

    #[tokio::test]
    async fn test_unparseable_query_reports_nothing_to_search() {
        let engine = SearchEngine::builder(options()).build();
        let mut handle = engine.search("hello world", None);
        assert!(matches!(handle.next().await, Some(SearchUpdate::NothingToSearch)));
    }

    #[tokio::test]
    async fn test_phases_without_fallback() {
        let registry = SourceRegistry::new();
        registry.register(Arc::new(MemorySource::new(
            "a",
            vec![verse("alice", "john-3-16", 1, "KJV")],
        )));
        let engine = SearchEngine::builder(options()).registry(registry).build();

        let mut handle = engine.search("John 3:16 KJV", None);
        let mut phases = Vec::new();
        let mut outcome = None;
        while let Some(update) = handle.next().await {
            match update {
                SearchUpdate::PhaseChanged(p) => phases.push(p),
                SearchUpdate::Ranked(o) => {
                    outcome = Some(o);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(
            phases,
            vec![
                Phase::Searching,
                Phase::AwaitingCompletion,
                Phase::Satisfied,
                Phase::Ranked
            ]
        );
        let outcome = outcome.unwrap();
        assert!(!outcome.fallback);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].sources, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_cache_hits_are_validated() {
        let cache = Arc::new(InMemoryCache::with_records(
            vec![
                verse("alice", "john-3-16", 1, "KJV"),
                verse("bob", "john-3-16", 1, "NIV"),
            ],
            "seed",
        ));
        let engine = SearchEngine::builder(options()).cache(cache).build();
        let outcome = engine.search("John 3:16 KJV", None).outcome().await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].ranked.record.author, "alice");
        assert_eq!(outcome.results[0].sources, vec!["seed".to_string()]);
    }

    #[tokio::test]
    async fn test_max_results_truncates() {
        let records = (0..5)
            .map(|i| verse(&format!("author-{}", i), "john-3-16", 1, "KJV"))
            .collect();
        let registry = SourceRegistry::new();
        registry.register(Arc::new(MemorySource::new("a", records)));
        let engine = SearchEngine::builder(EngineOptions {
            max_results: 2,
            ..options()
        })
        .registry(registry)
        .build();
        let outcome = engine.search("John 3:16", None).outcome().await.unwrap();
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn test_write_through_warms_cache() {
        let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCache::new());
        let registry = SourceRegistry::new();
        registry.register(Arc::new(MemorySource::new(
            "a",
            vec![verse("alice", "john-3-16", 1, "KJV")],
        )));
        let engine = SearchEngine::builder(options())
            .cache(cache.clone())
            .registry(registry)
            .write_through(true)
            .build();
        engine.search("John 3:16", None).outcome().await.unwrap();
        engine.flush_cache_writes().await;
        assert_eq!(cache.stats().await.unwrap().records, 1);
    }

    #[tokio::test]
    async fn test_verification_annotates_without_reordering() {
        struct OnlyBob;

        #[async_trait::async_trait]
        impl Verifier for OnlyBob {
            async fn verify(&self, identifier: &str) -> anyhow::Result<bool> {
                Ok(identifier == "bob")
            }
        }

        let registry = SourceRegistry::new();
        registry.register(Arc::new(MemorySource::new(
            "a",
            vec![
                verse("alice", "one", 1, "KJV"),
                verse("bob", "two", 1, "KJV"),
            ],
        )));
        let engine = SearchEngine::builder(options())
            .registry(registry)
            .verifier(Arc::new(OnlyBob))
            .build();
        let outcome = engine.search("John 3:16", None).outcome().await.unwrap();
        let summary: Vec<(&str, Option<Verification>)> = outcome
            .results
            .iter()
            .map(|r| (r.ranked.record.author.as_str(), r.verification))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("alice", Some(Verification::Unverified)),
                ("bob", Some(Verification::Verified)),
            ]
        );
    }
}
