//! Core data models used throughout Passage.
//!
//! These types represent parsed citations, the records returned by sources,
//! and the filters sent to them. Records follow the addressable-record
//! convention: one logical record per `(author, kind, "d" tag)`, where the
//! newest `created_at` is canonical.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Tag naming the identifier of an addressable record.
pub const TAG_IDENTIFIER: &str = "d";
/// Tag naming the book type (e.g. `"bible"`).
pub const TAG_TYPE: &str = "type";
pub const TAG_BOOK: &str = "book";
pub const TAG_CHAPTER: &str = "chapter";
pub const TAG_VERSE: &str = "verse";
pub const TAG_VERSION: &str = "version";

/// Kind used for scripture/book content records unless configured otherwise.
pub const DEFAULT_CONTENT_KIND: u32 = 30041;

// ═══════════════════════════════════════════════════════════════════════
// References
// ═══════════════════════════════════════════════════════════════════════

/// An ordered list of inclusive verse spans, e.g. `1,3,5-7`.
///
/// Spans are normalised so that `start <= end`; verse `0` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerseRange {
    spans: Vec<(u32, u32)>,
}

impl VerseRange {
    /// A single verse.
    pub fn single(verse: u32) -> Self {
        Self {
            spans: vec![(verse, verse)],
        }
    }

    /// An inclusive span. Reversed bounds are swapped.
    pub fn span(start: u32, end: u32) -> Self {
        Self {
            spans: vec![(start.min(end), start.max(end))],
        }
    }

    pub fn spans(&self) -> &[(u32, u32)] {
        &self.spans
    }

    /// Parse `16`, `5-8`, or `1,3,5-7`. Whitespace around separators and
    /// en/em dashes are tolerated. Returns `None` on any malformed part.
    pub fn parse(text: &str) -> Option<Self> {
        let mut spans = Vec::new();
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let normalized = part.replace(|c: char| c == '–' || c == '—', "-");
            let span = match normalized.split_once('-') {
                Some((a, b)) => {
                    let a = parse_positive(a)?;
                    let b = parse_positive(b)?;
                    (a.min(b), a.max(b))
                }
                None => {
                    let v = parse_positive(&normalized)?;
                    (v, v)
                }
            };
            spans.push(span);
        }
        if spans.is_empty() {
            None
        } else {
            Some(Self { spans })
        }
    }

    /// True when any span of `self` intersects any span of `other`.
    ///
    /// Partial overlap counts: `5-8` overlaps `6` and `8-10`.
    pub fn overlaps(&self, other: &VerseRange) -> bool {
        self.spans
            .iter()
            .any(|&(a0, a1)| other.spans.iter().any(|&(b0, b1)| a0 <= b1 && b0 <= a1))
    }

    pub fn contains(&self, verse: u32) -> bool {
        self.spans.iter().any(|&(a, b)| a <= verse && verse <= b)
    }
}

fn parse_positive(s: &str) -> Option<u32> {
    match s.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (a, b)) in self.spans.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if a == b {
                write!(f, "{}", a)?;
            } else {
                write!(f, "{}-{}", a, b)?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for VerseRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VerseRange::parse(&value).ok_or_else(|| format!("invalid verse range: '{}'", value))
    }
}

impl From<VerseRange> for String {
    fn from(value: VerseRange) -> Self {
        value.to_string()
    }
}

/// One structured citation: a canonical book plus optional chapter/verses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Canonical book name (e.g. `"John"`, `"1 Corinthians"`).
    pub book: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verses: Option<VerseRange>,
}

impl Reference {
    pub fn book(book: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            chapter: None,
            verses: None,
        }
    }

    pub fn chapter(book: impl Into<String>, chapter: u32) -> Self {
        Self {
            book: book.into(),
            chapter: Some(chapter),
            verses: None,
        }
    }

    pub fn verses(book: impl Into<String>, chapter: u32, verses: VerseRange) -> Self {
        Self {
            book: book.into(),
            chapter: Some(chapter),
            verses: Some(verses),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.book)?;
        if let Some(ch) = self.chapter {
            write!(f, " {}", ch)?;
            if let Some(v) = &self.verses {
                write!(f, ":{}", v)?;
            }
        }
        Ok(())
    }
}

/// The structured form of one query string.
///
/// A single edition qualifier lands in `version`; two or more distinct
/// qualifiers land in `versions`. Never mutated in place; re-parse on new
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub references: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<BTreeSet<String>>,
}

impl ParsedQuery {
    /// All requested editions, whichever field carries them.
    pub fn requested_versions(&self) -> Vec<&str> {
        match (&self.version, &self.versions) {
            (Some(v), _) => vec![v.as_str()],
            (None, Some(vs)) => vs.iter().map(String::as_str).collect(),
            (None, None) => Vec::new(),
        }
    }

    pub fn has_version_constraint(&self) -> bool {
        !self.requested_versions().is_empty()
    }

    /// The same references with every edition constraint removed.
    pub fn without_version(&self) -> ParsedQuery {
        ParsedQuery {
            references: self.references.clone(),
            version: None,
            versions: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════

/// Mapping of tag name to its ordered values.
///
/// Deserializes from either a JSON object (`{"book": ["John"]}`) or the
/// array-of-arrays wire form (`[["book", "John"]]`). Repeated tag names in
/// the array form append to the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TagsRepr")]
pub struct Tags(BTreeMap<String, Vec<String>>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TagsRepr {
    Map(BTreeMap<String, Vec<String>>),
    Pairs(Vec<Vec<String>>),
}

impl From<TagsRepr> for Tags {
    fn from(repr: TagsRepr) -> Self {
        match repr {
            TagsRepr::Map(map) => Tags(map),
            TagsRepr::Pairs(pairs) => {
                let mut tags = Tags::default();
                for pair in pairs {
                    let mut it = pair.into_iter();
                    if let Some(name) = it.next() {
                        tags.0.entry(name).or_default().extend(it);
                    }
                }
                tags
            }
        }
    }
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append of one value.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.0.entry(name.to_string()).or_default().push(value.into());
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Array-of-arrays form, one array per tag name.
    pub fn to_pairs(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|(name, values)| {
                let mut pair = Vec::with_capacity(values.len() + 1);
                pair.push(name.clone());
                pair.extend(values.iter().cloned());
                pair
            })
            .collect()
    }
}

/// A content record as delivered by a source or the cache.
///
/// Externally sourced and immutable once observed. `author` also accepts
/// the field name `pubkey` on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Content hash. Filled by [`ContentRecord::with_computed_id`] when empty.
    #[serde(default)]
    pub id: String,
    #[serde(alias = "pubkey")]
    pub author: String,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub content: String,
}

/// The identifier half of a [`RecordKey`].
///
/// Ids and `d` tags live in separate namespaces so that a non-addressable
/// record never collides with an addressable one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Tag(String),
    Id(String),
}

/// Uniqueness key used by the deduplicator: `(author, kind, identifier)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub author: String,
    pub kind: u32,
    pub identifier: Identifier,
}

impl ContentRecord {
    pub fn identifier(&self) -> Option<&str> {
        self.tags.first(TAG_IDENTIFIER)
    }

    pub fn key(&self) -> RecordKey {
        let identifier = match self.identifier() {
            Some(d) => Identifier::Tag(d.to_string()),
            None => Identifier::Id(self.id.clone()),
        };
        RecordKey {
            author: self.author.clone(),
            kind: self.kind,
            identifier,
        }
    }

    /// Cache category for this record: its kind as a decimal string.
    pub fn category(&self) -> String {
        category_for_kind(self.kind)
    }

    pub fn book_type(&self) -> Option<&str> {
        self.tags.first(TAG_TYPE)
    }

    pub fn book(&self) -> Option<&str> {
        self.tags.first(TAG_BOOK)
    }

    pub fn chapter(&self) -> Option<u32> {
        self.tags
            .first(TAG_CHAPTER)
            .and_then(|c| c.trim().parse().ok())
    }

    pub fn verses(&self) -> Option<VerseRange> {
        self.tags.first(TAG_VERSE).and_then(VerseRange::parse)
    }

    pub fn version(&self) -> Option<&str> {
        self.tags.first(TAG_VERSION)
    }

    /// SHA-256 over `[0, author, created_at, kind, tags, content]`.
    pub fn compute_id(&self) -> String {
        let canonical = serde_json::json!([
            0,
            self.author,
            self.created_at,
            self.kind,
            self.tags.to_pairs(),
            self.content
        ]);
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Fill an empty `id` with [`compute_id`](Self::compute_id).
    pub fn with_computed_id(mut self) -> Self {
        if self.id.is_empty() {
            self.id = self.compute_id();
        }
        self
    }

    pub fn created_at_iso(&self) -> String {
        format_ts_iso(self.created_at)
    }
}

/// Render a kind as a cache category.
pub fn category_for_kind(kind: u32) -> String {
    kind.to_string()
}

/// Format a Unix timestamp as ISO 8601.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// Filters
// ═══════════════════════════════════════════════════════════════════════

/// A coarse source-side predicate: kinds plus tag-value sets.
///
/// Sources are not assumed to evaluate anything finer than this; exact
/// verse and version matching happens after delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub kinds: Vec<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    /// Local evaluation, for sources and caches that hold records in process.
    ///
    /// The kind must be listed (an empty list accepts any kind) and every tag
    /// predicate must be satisfied by at least one record value. Comparison
    /// is exact.
    pub fn matches(&self, record: &ContentRecord) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind) {
            return false;
        }
        self.tags.iter().all(|(name, wanted)| {
            record
                .tags
                .values(name)
                .iter()
                .any(|v| wanted.iter().any(|w| w == v))
        })
    }
}
