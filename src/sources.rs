//! Configured sources: registry construction and status listing.
//!
//! Powers `psg sources` and `GET /sources`.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::config::{Config, SourceType};
use crate::source::SourceRegistry;
use crate::source_file::FileSource;
use crate::source_http::HttpSource;

/// One row of the source listing.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub source_type: String,
    /// File path or URL.
    pub location: String,
    /// For file sources, whether the file exists; HTTP sources are not probed.
    pub healthy: bool,
    pub notes: Option<String>,
}

/// Build a registry holding every `[[sources]]` entry.
pub fn registry_from_config(config: &Config) -> SourceRegistry {
    let registry = SourceRegistry::new();
    for source in &config.sources {
        match source.source_type {
            SourceType::File => {
                if let Some(path) = &source.path {
                    registry.register(Arc::new(FileSource::new(&source.id, path.clone())));
                }
            }
            SourceType::Http => {
                if let Some(url) = &source.url {
                    registry.register(Arc::new(HttpSource::new(&source.id, url.clone())));
                }
            }
        }
    }
    registry
}

pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    config
        .sources
        .iter()
        .map(|source| match source.source_type {
            SourceType::File => {
                let path = source.path.clone().unwrap_or_default();
                let exists = path.is_file();
                SourceStatus {
                    id: source.id.clone(),
                    source_type: source.source_type.as_str().to_string(),
                    location: path.display().to_string(),
                    healthy: exists,
                    notes: (!exists).then(|| "file does not exist".to_string()),
                }
            }
            SourceType::Http => SourceStatus {
                id: source.id.clone(),
                source_type: source.source_type.as_str().to_string(),
                location: source.url.clone().unwrap_or_default(),
                healthy: true,
                notes: None,
            },
        })
        .collect()
}

pub fn list_sources(config: &Config) -> Result<()> {
    let sources = get_sources(config);
    if sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    println!("{:<16} {:<6} {:<8} LOCATION", "SOURCE", "TYPE", "HEALTHY");
    for s in &sources {
        println!(
            "{:<16} {:<6} {:<8} {}{}",
            s.id,
            s.source_type,
            s.healthy,
            s.location,
            s.notes
                .as_deref()
                .map(|n| format!("  ({})", n))
                .unwrap_or_default()
        );
    }
    Ok(())
}
