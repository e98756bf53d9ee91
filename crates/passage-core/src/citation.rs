//! Citation parser.
//!
//! Turns a raw query such as `"Gen 3:5-8 KJV"` or
//! `"1 Cor 13:4-7; Rom 8:28 (ESV)"` into a [`ParsedQuery`]. Parsing never
//! fails with an error: input with no recognizable reference yields `None`,
//! which callers treat as "nothing to search".
//!
//! # Grammar
//!
//! Each `;`-separated segment is read as a run of citations
//!
//! ```text
//! segment   := words* citation ( words* citation )*
//! citation  := book chapverse? qualifier?
//! chapverse := CHAPTER ( ":" span ( "," span )* )?
//! span      := N | N "-" N
//! qualifier := word ( [,/|] word )*
//! ```
//!
//! - When a citation has a chapter, the book is the longest run of up to
//!   four words immediately before it that resolves in the book table;
//!   words before the first book are surrounding free text and ignored.
//! - A later chapter starts a new citation at the book in front of it, so
//!   `John 3:16, Rom 8:28` and `John 3:16 and Romans 8:28` are lists. A
//!   chapter with no book in front of it makes the segment malformed.
//! - Without a chapter, the book must start the segment and the words left
//!   after the longest resolvable prefix are the qualifier.
//! - Book types without an alias table take the words verbatim and require
//!   a chapter.
//! - Qualifier words that resolve in the version table are normalised.
//!   Other words count as an edition only when they look like an edition
//!   code (short, uppercase, e.g. `XYZ`), which keeps prose such as
//!   `what does John 3:16 say?` out of the edition list.
//! - Malformed segments are skipped.

use std::collections::BTreeSet;

use crate::catalog::{default_catalog, BookTable, Catalog};
use crate::models::{ParsedQuery, Reference, VerseRange};

/// Longest book name, in words, considered during resolution.
const MAX_BOOK_WORDS: usize = 4;

/// Parse `raw` against the default catalog.
///
/// ```rust
/// use passage_core::citation::parse;
///
/// let q = parse("Gen 3:5-8 KJV", "bible").unwrap();
/// assert_eq!(q.references[0].to_string(), "Genesis 3:5-8");
/// assert!(parse("not a citation", "bible").is_none());
/// ```
pub fn parse(raw: &str, book_type: &str) -> Option<ParsedQuery> {
    default_catalog().parse(raw, book_type)
}

impl Catalog {
    /// Parse `raw` against this catalog's tables for `book_type`.
    pub fn parse(&self, raw: &str, book_type: &str) -> Option<ParsedQuery> {
        let books = self.books(book_type);
        let mut references = Vec::new();
        let mut editions: Vec<String> = Vec::new();

        for segment in raw.split(';') {
            let tokens = tokenize(segment);
            let Some(citations) = parse_segment(&tokens, books) else {
                continue;
            };
            for citation in citations {
                self.collect_editions(citation.qualifier, &mut editions);
                references.push(citation.reference);
            }
        }

        if references.is_empty() {
            return None;
        }

        let (version, versions) = match editions.len() {
            0 => (None, None),
            1 => (editions.pop(), None),
            _ => (None, Some(editions.into_iter().collect::<BTreeSet<_>>())),
        };

        Some(ParsedQuery {
            references,
            version,
            versions,
        })
    }

    /// Append the editions named in `qualifier`, skipping duplicates.
    fn collect_editions(&self, qualifier: &[String], editions: &mut Vec<String>) {
        let joined = qualifier.join(" ");
        for part in joined.split(&[',', '/', '|'][..]) {
            let words: Vec<&str> = part.split_whitespace().collect();
            let mut i = 0;
            while i < words.len() {
                let known = (i + 1..=words.len()).rev().find_map(|end| {
                    self.versions()
                        .resolve(&words[i..end].join(" "))
                        .map(|canonical| (canonical.to_string(), end))
                });
                let (edition, next) = match known {
                    Some(found) => found,
                    None if looks_like_edition(words[i]) => (words[i].to_string(), i + 1),
                    None => {
                        i += 1;
                        continue;
                    }
                };
                if !editions.iter().any(|e| e.eq_ignore_ascii_case(&edition)) {
                    editions.push(edition);
                }
                i = next;
            }
        }
    }
}

/// `XYZ`, `NRSV2`: two to eight ASCII letters or digits, at least one
/// letter, no lowercase.
fn looks_like_edition(word: &str) -> bool {
    (2..=8).contains(&word.len())
        && word.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && word.chars().any(|c| c.is_ascii_uppercase())
}

/// Split a segment into tokens.
///
/// Brackets become whitespace, dashes are unified, whitespace around
/// `: , - / |` is removed so `3 : 16 - 18` reads as one token, trailing
/// sentence punctuation is dropped, a list comma between a chapter and
/// the next book (`3:16,Rom`) is split, and a book glued to its chapter
/// (`John3:16`) is split.
fn tokenize(segment: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(segment.len());
    let mut skip_ws = false;
    for c in segment.chars() {
        let c = match c {
            '(' | ')' | '[' | ']' => ' ',
            '–' | '—' => '-',
            other => other,
        };
        if matches!(c, ':' | ',' | '-' | '/' | '|') {
            while cleaned.ends_with(char::is_whitespace) {
                cleaned.pop();
            }
            cleaned.push(c);
            skip_ws = true;
        } else if c.is_whitespace() {
            if !skip_ws {
                cleaned.push(' ');
            }
        } else {
            cleaned.push(c);
            skip_ws = false;
        }
    }

    let mut tokens = Vec::new();
    for raw in cleaned.split_whitespace() {
        let token = raw.trim_end_matches(&['?', '!', '.', ','][..]);
        if token.is_empty() {
            continue;
        }
        let pieces = match split_list_comma(token) {
            Some((chapverse, next)) => vec![chapverse, next],
            None => vec![token],
        };
        for piece in pieces {
            match split_glued_chapter(piece) {
                Some((book, chapverse)) => {
                    tokens.push(book.to_string());
                    tokens.push(chapverse.to_string());
                }
                None => tokens.push(piece.to_string()),
            }
        }
    }
    tokens
}

/// `3:16,Rom` → (`3:16`, `Rom`). Commas between verse numbers stay.
fn split_list_comma(token: &str) -> Option<(&str, &str)> {
    let idx = token.rfind(',')?;
    let (head, tail) = (&token[..idx], &token[idx + 1..]);
    if is_chapverse(head) && tail.starts_with(|c: char| c.is_alphabetic()) {
        Some((head, tail))
    } else {
        None
    }
}

/// `John3:16` → (`John`, `3:16`). Leading ordinals (`1John`) are left to
/// the alias table.
fn split_glued_chapter(token: &str) -> Option<(&str, &str)> {
    let idx = token.find(|c: char| c.is_ascii_digit())?;
    if idx == 0 {
        return None;
    }
    let (head, tail) = token.split_at(idx);
    if head.chars().all(|c| c.is_alphabetic() || c == '.') && is_chapverse(tail) {
        Some((head, tail))
    } else {
        None
    }
}

fn is_chapverse(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ':' | ',' | '-'))
}

fn is_ordinal_digit(token: &str) -> bool {
    matches!(token, "1" | "2" | "3")
}

/// Parse `3`, `3:16`, or `3:16-18,20`.
fn parse_chapverse(token: &str) -> Option<(u32, Option<VerseRange>)> {
    let (chapter, verses) = match token.split_once(':') {
        Some((c, v)) => (c, Some(v)),
        None => (token, None),
    };
    let chapter: u32 = chapter.parse().ok().filter(|&c| c > 0)?;
    let verses = match verses {
        Some(v) => Some(VerseRange::parse(v)?),
        None => None,
    };
    Some((chapter, verses))
}

/// Index of the first chapter token, skipping digits that open an ordinal
/// book name (`1 John`).
fn find_chapter(tokens: &[String], books: Option<&BookTable>) -> Option<usize> {
    (0..tokens.len()).find(|&i| {
        if !is_chapverse(&tokens[i]) {
            return false;
        }
        match books {
            Some(table) if is_ordinal_digit(&tokens[i]) => {
                let upper = (i + MAX_BOOK_WORDS).min(tokens.len());
                !(i + 2..=upper).any(|end| table.resolve(&tokens[i..end].join(" ")).is_some())
            }
            _ => true,
        }
    })
}

/// A citation read from the front of a token run.
struct Citation<'a> {
    reference: Reference,
    /// Words after the citation, up to the next citation's book.
    qualifier: &'a [String],
    /// Tokens from the next citation's book on.
    rest: &'a [String],
}

/// Every citation in a segment, or `None` when any part is malformed.
fn parse_segment<'a>(
    tokens: &'a [String],
    books: Option<&BookTable>,
) -> Option<Vec<Citation<'a>>> {
    let mut citations = Vec::new();
    let mut rest = tokens;
    while !rest.is_empty() {
        let citation = parse_citation(rest, books)?;
        rest = citation.rest;
        citations.push(citation);
    }
    Some(citations)
}

fn parse_citation<'a>(tokens: &'a [String], books: Option<&BookTable>) -> Option<Citation<'a>> {
    let chapter_at = find_chapter(tokens, books);

    let (book, chapverse, tail) = match (books, chapter_at) {
        (Some(table), Some(p)) => {
            let start = book_start(tokens, p, table)?;
            let book = table.resolve(&tokens[start..p].join(" "))?.to_string();
            (book, Some(&tokens[p]), &tokens[p + 1..])
        }
        (Some(table), None) => {
            let upper = MAX_BOOK_WORDS.min(tokens.len());
            let (book, used) = (1..=upper)
                .rev()
                .find_map(|n| table.resolve(&tokens[..n].join(" ")).map(|b| (b, n)))?;
            (book.to_string(), None, &tokens[used..])
        }
        (None, Some(p)) if p > 0 => (tokens[..p].join(" "), Some(&tokens[p]), &tokens[p + 1..]),
        (None, _) => return None,
    };

    let (qualifier, rest) = split_tail(tail, books)?;

    let reference = match chapverse {
        Some(token) => {
            let (chapter, verses) = parse_chapverse(token)?;
            Reference {
                book,
                chapter: Some(chapter),
                verses,
            }
        }
        None => Reference::book(book),
    };

    Some(Citation {
        reference,
        qualifier,
        rest,
    })
}

/// Split what follows a citation at the book of the next one.
fn split_tail<'a>(
    tail: &'a [String],
    books: Option<&BookTable>,
) -> Option<(&'a [String], &'a [String])> {
    match find_chapter(tail, books) {
        None => Some(tail.split_at(tail.len())),
        Some(next) => {
            let start = book_start(tail, next, books?)?;
            Some(tail.split_at(start))
        }
    }
}

/// Start of the longest run of up to four tokens ending at `end` that
/// resolves in the book table.
fn book_start(tokens: &[String], end: usize, table: &BookTable) -> Option<usize> {
    (end.saturating_sub(MAX_BOOK_WORDS)..end)
        .find(|&start| table.resolve(&tokens[start..end].join(" ")).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_john_3_16_kjv() {
        let q = parse("John 3:16 KJV", "bible").unwrap();
        assert_eq!(q.references.len(), 1);
        let r = &q.references[0];
        assert_eq!(r.book, "John");
        assert_eq!(r.chapter, Some(3));
        assert_eq!(r.verses, Some(VerseRange::single(16)));
        assert_eq!(q.version.as_deref(), Some("KJV"));
        assert!(q.versions.is_none());
    }

    #[test]
    fn test_not_a_citation() {
        assert!(parse("not a citation", "bible").is_none());
        assert!(parse("", "bible").is_none());
        assert!(parse("   ;  ; ", "bible").is_none());
        assert!(parse("3:16", "bible").is_none());
    }

    #[test]
    fn test_abbreviation_and_range() {
        let q = parse("Gen 3:5-8 kjv", "bible").unwrap();
        assert_eq!(q.references[0].book, "Genesis");
        assert_eq!(q.references[0].verses, Some(VerseRange::span(5, 8)));
        assert_eq!(q.version.as_deref(), Some("KJV"));
    }

    #[test]
    fn test_ordinal_books() {
        let q = parse("1 Cor 13:4-7", "bible").unwrap();
        assert_eq!(q.references[0].book, "1 Corinthians");
        assert_eq!(q.references[0].chapter, Some(13));

        let q = parse("1John 1:9", "bible").unwrap();
        assert_eq!(q.references[0].book, "1 John");

        let q = parse("II Kings 2", "bible").unwrap();
        assert_eq!(q.references[0].book, "2 Kings");
        assert_eq!(q.references[0].verses, None);
    }

    #[test]
    fn test_chapter_one_is_not_an_ordinal() {
        let q = parse("John 1 KJV", "bible").unwrap();
        assert_eq!(q.references[0].book, "John");
        assert_eq!(q.references[0].chapter, Some(1));
        assert_eq!(q.version.as_deref(), Some("KJV"));
    }

    #[test]
    fn test_tolerant_spacing_and_lists() {
        let q = parse("Romans 8 : 28 - 30, 32", "bible").unwrap();
        let verses = q.references[0].verses.clone().unwrap();
        assert_eq!(verses.spans(), &[(28, 30), (32, 32)]);

        let q = parse("John3:16", "bible").unwrap();
        assert_eq!(q.references[0].to_string(), "John 3:16");

        let q = parse("Ps 23:1–3 (ESV)", "bible").unwrap();
        assert_eq!(q.references[0].book, "Psalms");
        assert_eq!(q.version.as_deref(), Some("ESV"));
    }

    #[test]
    fn test_multiple_references() {
        let q = parse("John 3:16; Rom 8:28 NIV", "bible").unwrap();
        assert_eq!(q.references.len(), 2);
        assert_eq!(q.references[1].book, "Romans");
        assert_eq!(q.version.as_deref(), Some("NIV"));
    }

    #[test]
    fn test_comma_separated_citations() {
        let q = parse("John 3:16, Rom 8:28", "bible").unwrap();
        let refs: Vec<String> = q.references.iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["John 3:16", "Romans 8:28"]);
        assert!(q.version.is_none());

        let q = parse("John 3:16,Rom 8:28-30 ESV", "bible").unwrap();
        assert_eq!(q.references.len(), 2);
        assert_eq!(q.references[1].verses, Some(VerseRange::span(28, 30)));
        assert_eq!(q.version.as_deref(), Some("ESV"));
    }

    #[test]
    fn test_citations_joined_by_words() {
        let q = parse("John 3:16 and Romans 8:28", "bible").unwrap();
        let refs: Vec<String> = q.references.iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["John 3:16", "Romans 8:28"]);
        assert!(q.version.is_none());

        let q = parse("John 3:16 KJV and 1 John 1:9", "bible").unwrap();
        assert_eq!(q.references[1].book, "1 John");
        assert_eq!(q.references[1].chapter, Some(1));
        assert_eq!(q.version.as_deref(), Some("KJV"));
    }

    #[test]
    fn test_prose_after_citation_is_not_an_edition() {
        let q = parse("John 3:16 in the king james version please", "bible").unwrap();
        assert_eq!(q.version.as_deref(), Some("KJV"));

        let q = parse("Rom 8:28 is lovely", "bible").unwrap();
        assert!(q.version.is_none());
    }

    #[test]
    fn test_multiple_versions() {
        let q = parse("John 3:16 KJV, niv", "bible").unwrap();
        assert!(q.version.is_none());
        let versions = q.versions.unwrap();
        assert!(versions.contains("KJV"));
        assert!(versions.contains("NIV"));

        let q = parse("John 3:16 KJV/kjv", "bible").unwrap();
        assert_eq!(q.version.as_deref(), Some("KJV"));
    }

    #[test]
    fn test_unknown_version_is_preserved() {
        let q = parse("John 3:16 XYZ", "bible").unwrap();
        assert_eq!(q.version.as_deref(), Some("XYZ"));
    }

    #[test]
    fn test_book_only_with_version() {
        let q = parse("Song of Solomon", "bible").unwrap();
        assert_eq!(q.references[0].book, "Song of Solomon");
        assert!(q.version.is_none());

        let q = parse("jude king james", "bible").unwrap();
        assert_eq!(q.references[0].book, "Jude");
        assert_eq!(q.version.as_deref(), Some("KJV"));
    }

    #[test]
    fn test_free_text_before_book() {
        let q = parse("what does John 3:16 say?", "bible").unwrap();
        assert_eq!(q.references[0].book, "John");
        assert_eq!(q.references[0].verses, Some(VerseRange::single(16)));
        assert!(q.version.is_none());
        assert!(q.versions.is_none());

        let q = parse("Is this John 3:16", "bible").unwrap();
        assert_eq!(q.references[0].book, "John");
    }

    #[test]
    fn test_invalid_segments_are_skipped() {
        let q = parse("Nowhere 3:16; Jude 1:3", "bible").unwrap();
        assert_eq!(q.references.len(), 1);
        assert_eq!(q.references[0].book, "Jude");

        assert!(parse("John 0:1", "bible").is_none());
        assert!(parse("John 3:0", "bible").is_none());
        assert!(parse("John 3:16 4:2", "bible").is_none());
        assert!(parse("John extra 3:16", "bible").is_none());
    }

    #[test]
    fn test_unknown_book_type_requires_chapter() {
        let q = parse("Al-Fatiha 1:1-7", "quran").unwrap();
        assert_eq!(q.references[0].book, "Al-Fatiha");
        assert_eq!(q.references[0].chapter, Some(1));
        assert!(parse("Al-Fatiha", "quran").is_none());
    }

    #[test]
    fn test_custom_catalog() {
        let mut catalog = Catalog::with_defaults();
        catalog.add_book("quran", "Al-Fatiha", &["fatiha"]);
        let q = catalog.parse("fatiha 1:2", "quran").unwrap();
        assert_eq!(q.references[0].book, "Al-Fatiha");
    }
}
