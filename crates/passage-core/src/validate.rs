//! Match validation: does a delivered record satisfy the parsed query?
//!
//! Sources receive only coarse filters (see [`compile`](crate::compile)),
//! so every record, cached or live, passes through [`matches`] before it
//! reaches a result set.
//!
//! Checks run in this order:
//!
//! 1. **Book type**: a record declaring a different `type` is rejected.
//! 2. **Version**: when the query requests editions and the record declares
//!    one, it must be among them (after catalog normalisation,
//!    case-insensitive). A mismatch rejects outright.
//! 3. **References**, OR-ed, first match wins: book (canonicalised,
//!    case-insensitive), then chapter if requested, then verse overlap if
//!    requested. A record without a verse tag covers its whole chapter.

use crate::catalog::{default_catalog, Catalog};
use crate::models::{ContentRecord, ParsedQuery, Reference};

/// Validate against the default catalog.
pub fn matches(record: &ContentRecord, query: &ParsedQuery, book_type: &str) -> bool {
    default_catalog().matches(record, query, book_type)
}

impl Catalog {
    pub fn matches(&self, record: &ContentRecord, query: &ParsedQuery, book_type: &str) -> bool {
        if let Some(declared) = record.book_type() {
            if !declared.trim().eq_ignore_ascii_case(book_type.trim()) {
                return false;
            }
        }

        if !self.version_compatible(record, query) {
            return false;
        }

        query
            .references
            .iter()
            .any(|reference| self.reference_matches(record, reference, book_type))
    }

    fn version_compatible(&self, record: &ContentRecord, query: &ParsedQuery) -> bool {
        let requested = query.requested_versions();
        if requested.is_empty() {
            return true;
        }
        match record.version() {
            None => true,
            Some(declared) => requested
                .iter()
                .any(|wanted| self.versions().same(wanted, declared)),
        }
    }

    fn reference_matches(&self, record: &ContentRecord, reference: &Reference, book_type: &str) -> bool {
        let Some(book) = record.book() else {
            return false;
        };
        let canonical = self.canonical_book(book_type, book);
        if !canonical.eq_ignore_ascii_case(&reference.book) {
            return false;
        }

        let Some(wanted_chapter) = reference.chapter else {
            return true;
        };
        if record.chapter() != Some(wanted_chapter) {
            return false;
        }

        match (&reference.verses, record.verses()) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(wanted), Some(has)) => has.overlaps(wanted),
        }
    }
}
