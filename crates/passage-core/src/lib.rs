//! # Passage Core
//!
//! Shared, WASM-safe logic for Passage: data models, citation parsing,
//! the book and version catalog, query compilation, the cache abstraction,
//! record deduplication, match validation, and trust ranking.
//!
//! This crate contains no tokio, sqlx, network, or filesystem dependencies.
//! The fan-out over live sources and the fallback controller live in the
//! `passage` application crate, which drives everything here.
//!
//! ```rust
//! use passage_core::citation::parse;
//!
//! let query = parse("John 3:16 KJV", "bible").unwrap();
//! assert_eq!(query.references[0].book, "John");
//! assert_eq!(query.version.as_deref(), Some("KJV"));
//! ```

pub mod cache;
pub mod catalog;
pub mod citation;
pub mod compile;
pub mod dedup;
pub mod models;
pub mod rank;
pub mod validate;
