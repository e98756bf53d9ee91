//! Query compiler: references → source filters.
//!
//! The compiler deliberately over-selects. Filters narrow by book type,
//! book and chapter only. Verse ranges and editions are never sent to
//! sources, because sources are not assumed to evaluate anything finer
//! than tag equality and records spell editions many ways (or not at
//! all). Exact verse and edition matching is the job of
//! [`validate`](crate::validate).
//!
//! Tag values are emitted in several casings (`"John"`, `"john"`,
//! `"JOHN"`), and the book predicate carries every spelling the catalog
//! knows for the book (`"Jn"`, `"jhn"`, ...), since sources compare tag
//! values exactly.

use crate::catalog::{default_catalog, Catalog};
use crate::models::{Filter, Reference, DEFAULT_CONTENT_KIND, TAG_BOOK, TAG_CHAPTER, TAG_TYPE};
use std::collections::BTreeMap;

/// Knobs for [`compile_with`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Record kind requested from sources.
    pub kind: u32,
    /// Per-filter result cap passed through to sources.
    pub limit: Option<usize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            kind: DEFAULT_CONTENT_KIND,
            limit: None,
        }
    }
}

/// Compile against the default catalog with default options.
pub fn compile(references: &[Reference], book_type: &str) -> Vec<Filter> {
    default_catalog().compile(&CompileOptions::default(), references, book_type)
}

/// Compile against the default catalog.
pub fn compile_with(
    opts: &CompileOptions,
    references: &[Reference],
    book_type: &str,
) -> Vec<Filter> {
    default_catalog().compile(opts, references, book_type)
}

impl Catalog {
    /// One filter per distinct `(book, chapter)` pair, in first-seen order.
    pub fn compile(
        &self,
        opts: &CompileOptions,
        references: &[Reference],
        book_type: &str,
    ) -> Vec<Filter> {
        let mut filters: Vec<Filter> = Vec::new();
        for reference in references {
            let mut tags = BTreeMap::new();
            tags.insert(TAG_TYPE.to_string(), case_variants([book_type]));
            tags.insert(TAG_BOOK.to_string(), self.book_values(book_type, &reference.book));
            if let Some(ch) = reference.chapter {
                tags.insert(TAG_CHAPTER.to_string(), vec![ch.to_string()]);
            }

            let filter = Filter {
                kinds: vec![opts.kind],
                tags,
                limit: opts.limit,
            };
            if !filters.contains(&filter) {
                filters.push(filter);
            }
        }
        filters
    }

    /// Tag values a record may use for `book`: every catalog spelling in
    /// every casing, plus glued ordinals (`1cor`).
    fn book_values(&self, book_type: &str, book: &str) -> Vec<String> {
        let known = self
            .books(book_type)
            .map(|table| table.spellings(book))
            .unwrap_or(&[]);
        if known.is_empty() {
            return case_variants([book]);
        }

        let mut spellings: Vec<String> = Vec::new();
        for spelling in known {
            spellings.push(spelling.clone());
            if let Some((ordinal, rest)) = spelling.split_once(' ') {
                if ordinal.chars().all(|c| c.is_ascii_digit()) {
                    spellings.push(format!("{}{}", ordinal, rest));
                }
            }
        }
        case_variants(spellings.iter().map(String::as_str))
    }
}

/// As given, lowercase, uppercase, and title case, without duplicates.
fn case_variants<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        for variant in [
            value.to_string(),
            value.to_lowercase(),
            value.to_uppercase(),
            title_case(value),
        ] {
            if !variant.is_empty() && !out.contains(&variant) {
                out.push(variant);
            }
        }
    }
    out
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerseRange;

    #[test]
    fn test_one_filter_per_book_chapter() {
        let refs = vec![
            Reference::verses("John", 3, VerseRange::single(16)),
            Reference::verses("John", 3, VerseRange::single(18)),
            Reference::chapter("Romans", 8),
        ];
        let filters = compile(&refs, "bible");
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].kinds, vec![DEFAULT_CONTENT_KIND]);
        assert_eq!(&filters[0].tags[TAG_BOOK][..3], &["John", "john", "JOHN"]);
        assert_eq!(filters[0].tags[TAG_CHAPTER], vec!["3"]);
        assert_eq!(filters[1].tags[TAG_BOOK][0], "Romans");
    }

    #[test]
    fn test_book_predicate_carries_catalog_spellings() {
        let filters = compile(&[Reference::chapter("John", 3)], "bible");
        let books = &filters[0].tags[TAG_BOOK];
        for spelling in ["John", "jn", "Jn", "JN", "jhn", "Jhn", "joh"] {
            assert!(books.contains(&spelling.to_string()), "missing {}", spelling);
        }

        let filters = compile(&[Reference::chapter("1 Corinthians", 13)], "bible");
        let books = &filters[0].tags[TAG_BOOK];
        for spelling in ["1 Corinthians", "1 Cor", "1cor", "1COR", "1 co"] {
            assert!(books.contains(&spelling.to_string()), "missing {}", spelling);
        }
    }

    #[test]
    fn test_unknown_book_type_uses_the_name_as_given() {
        let filters = compile(&[Reference::chapter("Al-Fatiha", 1)], "quran");
        assert_eq!(
            filters[0].tags[TAG_BOOK],
            vec!["Al-Fatiha", "al-fatiha", "AL-FATIHA", "Al-fatiha"]
        );
    }

    #[test]
    fn test_custom_catalog_spellings() {
        let mut catalog = Catalog::with_defaults();
        catalog.add_book("quran", "Al-Fatiha", &["fatiha"]);
        let filters = catalog.compile(
            &CompileOptions::default(),
            &[Reference::chapter("Al-Fatiha", 1)],
            "quran",
        );
        assert!(filters[0].tags[TAG_BOOK].contains(&"Fatiha".to_string()));
    }

    #[test]
    fn test_verses_and_versions_are_not_compiled() {
        let filters = compile(&[Reference::verses("John", 3, VerseRange::single(16))], "bible");
        assert!(!filters[0].tags.contains_key("verse"));
        assert!(!filters[0].tags.contains_key("version"));
    }

    #[test]
    fn test_book_only_has_no_chapter_predicate() {
        let filters = compile(&[Reference::book("Jude")], "bible");
        assert!(!filters[0].tags.contains_key(TAG_CHAPTER));
        assert_eq!(filters[0].tags[TAG_TYPE], vec!["bible", "BIBLE", "Bible"]);
    }

    #[test]
    fn test_options_are_applied() {
        let opts = CompileOptions {
            kind: 30023,
            limit: Some(100),
        };
        let filters = compile_with(&opts, &[Reference::book("Ruth")], "bible");
        assert_eq!(filters[0].kinds, vec![30023]);
        assert_eq!(filters[0].limit, Some(100));
    }

    #[test]
    fn test_empty_references() {
        assert!(compile(&[], "bible").is_empty());
    }
}
