//! `psg search`: run one search to completion and print it.

use anyhow::Result;

use passage_core::models::{ParsedQuery, TAG_BOOK, TAG_CHAPTER, TAG_VERSE, TAG_VERSION};

use crate::config::Config;
use crate::engine::{SearchEngine, SearchOutcome, SearchResult};
use crate::verify::Verification;

const EXCERPT_CHARS: usize = 160;

pub async fn run_search(
    config: &Config,
    query: &str,
    book_type: Option<String>,
    json: bool,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let engine = SearchEngine::from_config(config).await?;
    let outcome = engine.search(query, book_type.as_deref()).outcome().await;
    engine.flush_cache_writes().await;

    let Some(mut outcome) = outcome else {
        if json {
            println!("{}", serde_json::json!({ "query": query, "results": [] }));
        } else {
            println!("No recognizable reference in \"{}\".", query);
        }
        return Ok(());
    };

    if let Some(limit) = limit {
        outcome.results.truncate(limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_outcome(&outcome);
    Ok(())
}

fn describe_query(query: &ParsedQuery) -> String {
    let refs: Vec<String> = query.references.iter().map(|r| r.to_string()).collect();
    let versions = query.requested_versions();
    if versions.is_empty() {
        refs.join("; ")
    } else {
        format!("{} ({})", refs.join("; "), versions.join(", "))
    }
}

fn print_outcome(outcome: &SearchOutcome) {
    println!("Query: {}", describe_query(&outcome.query));
    if outcome.fallback {
        println!(
            "Requested edition not found; showing all editions ({}).",
            outcome.query.requested_versions().join(", ")
        );
    }
    if !outcome.attempt.sources_failed.is_empty() {
        println!(
            "Unavailable sources: {}",
            outcome.attempt.sources_failed.join(", ")
        );
    }
    println!();

    if outcome.results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in outcome.results.iter().enumerate() {
        print_result(i + 1, result);
    }
}

fn print_result(n: usize, result: &SearchResult) {
    let record = &result.ranked.record;
    let tags = &record.tags;
    let mut citation = tags.first(TAG_BOOK).unwrap_or("?").to_string();
    if let Some(ch) = tags.first(TAG_CHAPTER) {
        citation.push(' ');
        citation.push_str(ch);
        if let Some(v) = tags.first(TAG_VERSE) {
            citation.push(':');
            citation.push_str(v);
        }
    }
    if let Some(version) = tags.first(TAG_VERSION) {
        citation.push(' ');
        citation.push_str(version);
    }

    println!(
        "{}. [{:.2}] {} / {}",
        n, result.ranked.trust, citation, record.author
    );
    println!("    created: {}", record.created_at_iso());
    if !result.sources.is_empty() {
        println!("    sources: {}", result.sources.join(", "));
    }
    if let Some(v) = result.verification {
        let label = match v {
            Verification::Verified => "verified",
            Verification::Unverified => "unverified",
            Verification::TimedOut => "timed out",
        };
        println!("    verification: {}", label);
    }
    println!("    excerpt: \"{}\"", excerpt(&record.content));
    println!("    id: {}", record.id);
    println!();
}

fn excerpt(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passage_core::models::{Reference, VerseRange};

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let out = excerpt(&long);
        assert_eq!(out.chars().count(), EXCERPT_CHARS + 1);
        assert_eq!(excerpt("a\nb"), "a b");
    }

    #[test]
    fn test_describe_query() {
        let q = ParsedQuery {
            references: vec![
                Reference::verses("John", 3, VerseRange::single(16)),
                Reference::chapter("Romans", 8),
            ],
            version: Some("KJV".into()),
            versions: None,
        };
        assert_eq!(describe_query(&q), "John 3:16; Romans 8 (KJV)");
    }
}
