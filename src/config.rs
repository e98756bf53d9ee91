//! TOML configuration for the `psg` binary and the HTTP server.
//!
//! Every section is optional; an empty file yields a working setup with an
//! in-memory cache, no sources, and the default `"bible"` catalog.
//!
//! | Section | Purpose |
//! |---------|---------|
//! | `[cache]` | SQLite cache path and write-through toggle |
//! | `[search]` | Book type, record kind, debounce, timeouts, result cap |
//! | `[[sources]]` | File and HTTP sources, by id |
//! | `[verification]` | Optional author verification endpoint |
//! | `[trust.scores]` | Per-author trust weights |
//! | `[catalog]` | Extra book types, book aliases, and version aliases |
//! | `[server]` | Bind address for `psg serve` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use passage_core::catalog::Catalog;
use passage_core::models::DEFAULT_CONTENT_KIND;

const MAX_DEBOUNCE_MS: u64 = 60_000;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub verification: Option<VerificationConfig>,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// SQLite file. Without it the cache lives in memory for the process.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Store every record delivered by a live source.
    #[serde(default)]
    pub write_through: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_book_type")]
    pub book_type: String,
    #[serde(default = "default_kind")]
    pub kind: u32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            book_type: default_book_type(),
            kind: default_kind(),
            debounce_ms: default_debounce_ms(),
            source_timeout_secs: default_source_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

fn default_book_type() -> String {
    "bible".to_string()
}
fn default_kind() -> u32 {
    DEFAULT_CONTENT_KIND
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_source_timeout_secs() -> u64 {
    10
}
fn default_max_results() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    File,
    Http,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::File => "file",
            SourceType::Http => "http",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// JSON-lines file, for `file` sources.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Query endpoint, for `http` sources.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VerificationConfig {
    pub endpoint: String,
    #[serde(default = "default_verification_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_verification_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrustConfig {
    #[serde(default)]
    pub scores: HashMap<String, f64>,
}

/// Catalog extensions. Entries are merged over the built-in tables.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// book type → canonical book name → aliases.
    #[serde(default)]
    pub books: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// canonical version → aliases.
    #[serde(default)]
    pub versions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Defaults only: in-memory cache, no sources.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// The built-in catalog with this config's extensions applied.
    pub fn build_catalog(&self) -> Catalog {
        let mut catalog = Catalog::with_defaults();
        for (book_type, books) in &self.catalog.books {
            for (canonical, aliases) in books {
                let aliases: Vec<&str> = aliases.iter().map(String::as_str).collect();
                catalog.add_book(book_type, canonical, &aliases);
            }
        }
        for (canonical, aliases) in &self.catalog.versions {
            let aliases: Vec<&str> = aliases.iter().map(String::as_str).collect();
            catalog.add_version(canonical, &aliases);
        }
        catalog
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate search
    if config.search.book_type.trim().is_empty() {
        bail!("search.book_type must not be empty");
    }
    if config.search.debounce_ms > MAX_DEBOUNCE_MS {
        bail!("search.debounce_ms must be <= {}", MAX_DEBOUNCE_MS);
    }
    if config.search.source_timeout_secs == 0 {
        bail!("search.source_timeout_secs must be > 0");
    }
    if config.search.max_results < 1 {
        bail!("search.max_results must be >= 1");
    }

    // Validate sources
    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.id.trim().is_empty() {
            bail!("sources: id must not be empty");
        }
        if !seen.insert(source.id.as_str()) {
            bail!("sources: duplicate id '{}'", source.id);
        }
        match source.source_type {
            SourceType::File if source.path.is_none() => {
                bail!("sources.{}: file sources require 'path'", source.id)
            }
            SourceType::Http if source.url.as_deref().map_or(true, |u| u.trim().is_empty()) => {
                bail!("sources.{}: http sources require 'url'", source.id)
            }
            _ => {}
        }
    }

    // Validate verification
    if let Some(verification) = &config.verification {
        if verification.endpoint.trim().is_empty() {
            bail!("verification.endpoint must not be empty");
        }
        if verification.timeout_secs == 0 {
            bail!("verification.timeout_secs must be > 0");
        }
    }

    // Validate trust
    for (author, score) in &config.trust.scores {
        if !score.is_finite() {
            bail!("trust.scores.{}: score must be a finite number", author);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.search.book_type, "bible");
        assert_eq!(config.search.kind, 30041);
        assert_eq!(config.search.debounce(), Duration::from_millis(500));
        assert_eq!(config.search.source_timeout(), Duration::from_secs(10));
        assert_eq!(config.search.max_results, 50);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
        assert!(config.cache.path.is_none());
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
            [cache]
            path = "./data/cache.sqlite"
            write_through = true

            [search]
            debounce_ms = 100
            max_results = 5

            [[sources]]
            id = "local"
            type = "file"
            path = "./records.jsonl"

            [[sources]]
            id = "node-a"
            type = "http"
            url = "http://localhost:9000/query"

            [verification]
            endpoint = "http://localhost:9001/verify"

            [trust.scores]
            alice = 0.9

            [catalog.versions]
            "LXX" = ["septuagint"]
            "#,
        )
        .unwrap();
        assert!(config.cache.write_through);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].source_type, SourceType::Http);
        assert_eq!(config.verification.unwrap().timeout_secs, 10);
        assert_eq!(config.trust.scores["alice"], 0.9);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse_config("[search]\ndebounce_ms = 60001").is_err());
        assert!(parse_config("[search]\nsource_timeout_secs = 0").is_err());
        assert!(parse_config("[search]\nmax_results = 0").is_err());
        assert!(parse_config("[[sources]]\nid = \"a\"\ntype = \"file\"").is_err());
        assert!(parse_config("[[sources]]\nid = \"a\"\ntype = \"http\"").is_err());
        assert!(parse_config("[[sources]]\nid = \"a\"\ntype = \"ftp\"\nurl = \"x\"").is_err());
    }

    #[test]
    fn test_rejects_duplicate_source_ids() {
        let err = parse_config(
            r#"
            [[sources]]
            id = "a"
            type = "file"
            path = "x.jsonl"

            [[sources]]
            id = "a"
            type = "file"
            path = "y.jsonl"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_catalog_extensions() {
        let config = parse_config(
            r#"
            [catalog.books.quran]
            "Al-Fatiha" = ["fatiha", "opening"]

            [catalog.versions]
            "LXX" = ["septuagint"]
            "#,
        )
        .unwrap();
        let catalog = config.build_catalog();
        assert_eq!(
            catalog.books("quran").and_then(|t| t.resolve("Fatiha")),
            Some("Al-Fatiha")
        );
        assert_eq!(catalog.versions().normalize("Septuagint"), "LXX");
        assert!(catalog.books("bible").is_some());
    }
}
