//! # Passage
//!
//! Reference lookup over a decentralized network of content sources.
//!
//! A query such as `"Jn 3:16-18 KJV"` is parsed into structured references,
//! compiled into tag filters, and sent to every configured source at once.
//! Records stream back, are deduplicated (newest per key wins), validated
//! against the query, and, once every source has answered, ranked by the
//! author's trust score. When a requested edition turns up nothing, the
//! search retries once without the edition constraint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ passage-core │──▶│    Engine     │──▶│ Fan-out     │──▶ file / HTTP sources
//! │ parse+compile│   │ fallback+rank │   │ orchestrator│
//! └──────────────┘   └──────┬───────┘   └─────────────┘
//!                           │  ▲
//!                           ▼  │ cache gate / write-through
//!                      ┌────────────┐
//!                      │ SQLite /   │
//!                      │ in-memory  │
//!                      └────────────┘
//!                    ┌──────┴──────┐
//!                    ▼             ▼
//!               ┌────────┐    ┌────────┐
//!               │  CLI   │    │  HTTP  │
//!               │ (psg)  │    │  API   │
//!               └────────┘    └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! psg init                       # create the cache database
//! psg sources                    # check configured sources
//! psg search "Rom 8:28 ESV"
//! psg serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`engine`] | Search lifecycle, version fallback, ranking |
//! | [`fanout`] | Concurrent source querying |
//! | [`source`] | Source trait and registry |
//! | [`source_file`] | JSON-lines file source |
//! | [`source_http`] | HTTP source |
//! | [`debounce`] | Trailing-edge snapshot timer |
//! | [`cache_sqlite`] | SQLite cache backend |
//! | [`warm`] | Write-through cache warmer |
//! | [`trust`] | Runtime trust scores |
//! | [`verify`] | Author identity verification |
//! | [`search`] | `psg search` output |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache_sqlite;
pub mod config;
pub mod db;
pub mod debounce;
pub mod engine;
pub mod fanout;
pub mod migrate;
pub mod search;
pub mod server;
pub mod source;
pub mod source_file;
pub mod source_http;
pub mod sources;
pub mod stats;
pub mod trust;
pub mod verify;
pub mod warm;
