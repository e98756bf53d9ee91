//! End-to-end search engine tests over in-process sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use passage::engine::{EngineOptions, Phase, SearchEngine, SearchUpdate};
use passage::source::{MemorySource, RecordSink, Source, SourceRegistry};
use passage_core::models::{
    ContentRecord, Filter, Tags, DEFAULT_CONTENT_KIND, TAG_BOOK, TAG_CHAPTER, TAG_IDENTIFIER,
    TAG_TYPE, TAG_VERSE, TAG_VERSION,
};
use passage_core::rank::StaticTrustScores;

fn record(
    author: &str,
    d: &str,
    ts: i64,
    book: &str,
    chapter: u32,
    verse: &str,
    version: &str,
) -> ContentRecord {
    ContentRecord {
        id: String::new(),
        author: author.into(),
        created_at: ts,
        kind: DEFAULT_CONTENT_KIND,
        tags: Tags::new()
            .with(TAG_IDENTIFIER, d)
            .with(TAG_TYPE, "bible")
            .with(TAG_BOOK, book)
            .with(TAG_CHAPTER, chapter.to_string())
            .with(TAG_VERSE, verse)
            .with(TAG_VERSION, version),
        content: format!("{} {}:{} ({}) by {} at {}", book, chapter, verse, version, author, ts),
    }
    .with_computed_id()
}

fn unversioned(author: &str, d: &str, book: &str, chapter: u32, verse: &str) -> ContentRecord {
    ContentRecord {
        id: String::new(),
        author: author.into(),
        created_at: 1,
        kind: DEFAULT_CONTENT_KIND,
        tags: Tags::new()
            .with(TAG_IDENTIFIER, d)
            .with(TAG_TYPE, "bible")
            .with(TAG_BOOK, book)
            .with(TAG_CHAPTER, chapter.to_string())
            .with(TAG_VERSE, verse),
        content: format!("{} {}:{} by {}", book, chapter, verse, author),
    }
    .with_computed_id()
}

/// Answers its first query late with a stale revision and every later
/// query at once with the current one.
struct RevisingSource {
    queries: AtomicUsize,
    stale: ContentRecord,
    fresh: ContentRecord,
}

#[async_trait]
impl Source for RevisingSource {
    fn id(&self) -> &str {
        "revising"
    }

    async fn query(&self, _filters: &[Filter], sink: RecordSink) -> Result<()> {
        if self.queries.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            sink.send(self.stale.clone());
        } else {
            sink.send(self.fresh.clone());
        }
        Ok(())
    }
}

fn options() -> EngineOptions {
    EngineOptions {
        debounce: Duration::from_millis(25),
        source_timeout: Duration::from_secs(2),
        ..EngineOptions::default()
    }
}

#[tokio::test]
async fn test_merges_dedups_and_ranks_across_sources() {
    let registry = SourceRegistry::new();
    registry.register(Arc::new(
        MemorySource::new(
            "relay-a",
            vec![
                record("alice", "john-3-16", 100, "John", 3, "16", "KJV"),
                record("bob", "john-3-16", 50, "John", 3, "16", "KJV"),
            ],
        )
        .with_delay(Duration::from_millis(10)),
    ));
    registry.register(Arc::new(MemorySource::new(
        "relay-b",
        vec![
            // Newer edition of alice's record; must replace the one from relay-a.
            record("alice", "john-3-16", 200, "John", 3, "16", "KJV"),
            record("carol", "john-3-16", 10, "John", 3, "16", "KJV"),
        ],
    )));
    registry.register(Arc::new(
        MemorySource::new(
            "broken",
            vec![record("mallory", "john-3-16", 999, "John", 3, "16", "KJV")],
        )
        .failing("connection reset"),
    ));

    let trust = StaticTrustScores::new()
        .with("alice", 0.5)
        .with("bob", 0.9)
        .with("carol", 0.1);
    let engine = SearchEngine::builder(options())
        .registry(registry)
        .trust(Arc::new(trust))
        .build();

    let outcome = engine.search("Jn 3:16", None).outcome().await.unwrap();

    let authors: Vec<&str> = outcome
        .results
        .iter()
        .map(|r| r.ranked.record.author.as_str())
        .collect();
    // mallory's record was delivered before the failure and still counts.
    assert_eq!(authors, vec!["bob", "alice", "carol", "mallory"]);

    let alice = &outcome.results[1].ranked.record;
    assert_eq!(alice.created_at, 200);

    assert_eq!(outcome.attempt.sources_queried.len(), 3);
    assert_eq!(outcome.attempt.sources_failed, vec!["broken".to_string()]);
    assert!(!outcome.fallback);
}

#[tokio::test]
async fn test_one_result_per_key_regardless_of_arrival_order() {
    for (first_ts, second_ts) in [(1, 2), (2, 1)] {
        let registry = SourceRegistry::new();
        registry.register(Arc::new(MemorySource::new(
            "first",
            vec![record("alice", "ps-23", first_ts, "Psalms", 23, "1", "ESV")],
        )));
        registry.register(Arc::new(
            MemorySource::new(
                "second",
                vec![record("alice", "ps-23", second_ts, "Psalms", 23, "1", "ESV")],
            )
            .with_delay(Duration::from_millis(20)),
        ));
        let engine = SearchEngine::builder(options()).registry(registry).build();
        let outcome = engine.search("Ps 23:1", None).outcome().await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].ranked.record.created_at, 2);
    }
}

#[tokio::test]
async fn test_missing_edition_falls_back_to_all_editions() {
    let registry = SourceRegistry::new();
    registry.register(Arc::new(MemorySource::new(
        "relay",
        vec![
            record("alice", "gen-1-1-kjv", 1, "Genesis", 1, "1", "KJV"),
            record("bob", "gen-1-1-esv", 1, "Genesis", 1, "1", "ESV"),
        ],
    )));
    let engine = SearchEngine::builder(options()).registry(registry).build();

    let mut handle = engine.search("Gen 1:1 XYZ", None);
    let mut phases = Vec::new();
    let mut dropped = None;
    let mut outcome = None;
    while let Some(update) = handle.next().await {
        match update {
            SearchUpdate::PhaseChanged(p) => phases.push(p),
            SearchUpdate::Fallback { dropped_versions } => dropped = Some(dropped_versions),
            SearchUpdate::Snapshot(snapshot) => assert!(snapshot.fallback),
            SearchUpdate::Ranked(o) => {
                outcome = Some(o);
                break;
            }
            SearchUpdate::NothingToSearch => panic!("query should parse"),
        }
    }

    assert_eq!(dropped, Some(vec!["XYZ".to_string()]));
    assert_eq!(
        phases,
        vec![
            Phase::Searching,
            Phase::AwaitingCompletion,
            Phase::VersionFallback,
            Phase::Ranked
        ]
    );
    let outcome = outcome.unwrap();
    assert!(outcome.fallback);
    assert_eq!(outcome.query.version.as_deref(), Some("XYZ"));
    assert_eq!(outcome.results.len(), 2);
}

#[tokio::test]
async fn test_no_fallback_without_edition_constraint() {
    let engine = SearchEngine::builder(options()).build();
    let outcome = engine.search("Gen 1:1", None).outcome().await.unwrap();
    assert!(!outcome.fallback);
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn test_new_search_supersedes_active_one() {
    // The stale revision is newer by timestamp, so it would win dedup if
    // the superseded query's delivery leaked into the second search.
    let mut stale = record("alice", "john-3-16", 2, "John", 3, "16", "KJV");
    stale.content = "stale".into();
    let stale = stale.with_computed_id();
    let mut fresh = record("alice", "john-3-16", 1, "John", 3, "16", "KJV");
    fresh.content = "fresh".into();
    let fresh = fresh.with_computed_id();

    let source = Arc::new(RevisingSource {
        queries: AtomicUsize::new(0),
        stale,
        fresh: fresh.clone(),
    });
    let registry = SourceRegistry::new();
    registry.register(source.clone());
    let engine = SearchEngine::builder(options()).registry(registry).build();

    let first = engine.search("John 3:16", None);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = engine.search("John 3:16", None);

    assert!(first.outcome().await.is_none());

    let outcome = second.outcome().await.unwrap();
    assert_eq!(source.queries.load(Ordering::SeqCst), 2);
    let ids: Vec<&str> = outcome
        .results
        .iter()
        .map(|r| r.ranked.record.id.as_str())
        .collect();
    assert_eq!(ids, vec![fresh.id.as_str()]);
    assert_eq!(outcome.results[0].ranked.record.content, "fresh");
}

#[tokio::test]
async fn test_cancelled_search_emits_nothing_further() {
    let registry = SourceRegistry::new();
    registry.register(Arc::new(
        MemorySource::new(
            "slow",
            vec![record("alice", "john-3-16", 1, "John", 3, "16", "KJV")],
        )
        .with_delay(Duration::from_millis(100)),
    ));
    let engine = SearchEngine::builder(options()).registry(registry).build();

    let mut handle = engine.search("John 3:16", None);
    assert!(matches!(
        handle.next().await,
        Some(SearchUpdate::PhaseChanged(Phase::Searching))
    ));
    handle.cancel();

    while let Some(update) = handle.next().await {
        assert!(
            matches!(update, SearchUpdate::PhaseChanged(Phase::AwaitingCompletion)),
            "unexpected update after cancel: {:?}",
            update
        );
    }
}

#[tokio::test]
async fn test_source_registered_mid_query_is_included() {
    let registry = SourceRegistry::new();
    registry.register(Arc::new(
        MemorySource::new(
            "early",
            vec![record("alice", "john-3-16", 1, "John", 3, "16", "KJV")],
        )
        .with_delay(Duration::from_millis(150)),
    ));
    let engine = SearchEngine::builder(options())
        .registry(registry.clone())
        .build();

    let handle = engine.search("John 3:16", None);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let late = Arc::new(MemorySource::new(
        "late",
        vec![record("bob", "john-3-16", 1, "John", 3, "16", "KJV")],
    ));
    registry.register(late.clone());

    let outcome = handle.outcome().await.unwrap();
    assert_eq!(late.query_count(), 1);
    assert_eq!(outcome.attempt.sources_queried, vec!["early", "late"]);
    assert_eq!(outcome.results.len(), 2);
}

#[tokio::test]
async fn test_snapshots_grow_and_never_drop_records() {
    let records = (1..=8)
        .map(|v| {
            record(
                &format!("author-{}", v),
                &format!("john-3-{}", v),
                1,
                "John",
                3,
                &v.to_string(),
                "KJV",
            )
        })
        .collect();
    let registry = SourceRegistry::new();
    registry.register(Arc::new(
        MemorySource::new("trickle", records).with_record_delay(Duration::from_millis(15)),
    ));
    let engine = SearchEngine::builder(EngineOptions {
        debounce: Duration::from_millis(40),
        ..options()
    })
    .registry(registry)
    .build();

    let mut handle = engine.search("John 3", None);
    let mut snapshots: Vec<Vec<String>> = Vec::new();
    let mut ranked = None;
    while let Some(update) = handle.next().await {
        match update {
            SearchUpdate::Snapshot(s) => {
                snapshots.push(s.records.iter().map(|r| r.id.clone()).collect())
            }
            SearchUpdate::Ranked(o) => {
                ranked = Some(o);
                break;
            }
            _ => {}
        }
    }

    assert!(!snapshots.is_empty());
    for pair in snapshots.windows(2) {
        assert!(pair[1].len() >= pair[0].len());
        assert_eq!(&pair[1][..pair[0].len()], &pair[0][..]);
    }
    assert_eq!(snapshots.last().unwrap().len(), 8);
    assert_eq!(ranked.unwrap().results.len(), 8);
}

#[tokio::test]
async fn test_verse_outside_request_is_rejected() {
    let registry = SourceRegistry::new();
    registry.register(Arc::new(MemorySource::new(
        "relay",
        vec![
            record("alice", "a", 1, "Genesis", 3, "6", "KJV"),
            record("bob", "b", 1, "Genesis", 3, "9", "KJV"),
            record("carol", "c", 1, "Genesis", 3, "4-5", "KJV"),
        ],
    )));
    let engine = SearchEngine::builder(options()).registry(registry).build();
    let outcome = engine.search("Gen 3:5-8", None).outcome().await.unwrap();
    let mut authors: Vec<&str> = outcome
        .results
        .iter()
        .map(|r| r.ranked.record.author.as_str())
        .collect();
    authors.sort();
    assert_eq!(authors, vec!["alice", "carol"]);
}

#[tokio::test]
async fn test_edition_aliases_and_unversioned_records_satisfy_edition() {
    let registry = SourceRegistry::new();
    registry.register(Arc::new(MemorySource::new(
        "relay",
        vec![
            unversioned("alice", "john-3-16", "John", 3, "16"),
            record("bob", "john-3-16", 1, "John", 3, "16", "King James Version"),
            record("carol", "john-3-16", 1, "John", 3, "16", "ESV"),
        ],
    )));
    let engine = SearchEngine::builder(options()).registry(registry).build();

    let outcome = engine.search("John 3:16 KJV", None).outcome().await.unwrap();
    assert!(!outcome.fallback);
    let mut authors: Vec<&str> = outcome
        .results
        .iter()
        .map(|r| r.ranked.record.author.as_str())
        .collect();
    authors.sort();
    assert_eq!(authors, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_record_tagged_with_book_alias_is_found() {
    let registry = SourceRegistry::new();
    registry.register(Arc::new(MemorySource::new(
        "relay",
        vec![
            record("alice", "jn-3-16", 1, "Jn", 3, "16", "KJV"),
            record("bob", "1co-13-4", 1, "1 Cor", 13, "4", "KJV"),
        ],
    )));
    let engine = SearchEngine::builder(options()).registry(registry).build();

    let outcome = engine.search("John 3:16", None).outcome().await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].ranked.record.book(), Some("Jn"));

    let outcome = engine
        .search("1 Corinthians 13:4", None)
        .outcome()
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].ranked.record.author, "bob");
}
