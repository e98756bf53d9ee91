//! JSON-lines file source.
//!
//! Each non-empty line is one record. Filters are evaluated locally with
//! [`Filter::matches`], and records without an id get their content hash.
//! The file is re-read on every query so edits show up without a restart.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use passage_core::models::{ContentRecord, Filter};

use crate::source::{select, RecordSink, Source};

pub struct FileSource {
    id: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse JSON-lines text. Malformed lines are skipped with a warning.
pub fn parse_jsonl(text: &str, origin: &str) -> Vec<ContentRecord> {
    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ContentRecord>(line) {
            Ok(record) => records.push(record.with_computed_id()),
            Err(e) => warn!(file = %origin, line = n + 1, error = %e, "skipping malformed record"),
        }
    }
    records
}

#[async_trait]
impl Source for FileSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "file"
    }

    async fn query(&self, filters: &[Filter], sink: RecordSink) -> Result<()> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read source file: {}", self.path.display()))?;
        let records = parse_jsonl(&text, &self.path.display().to_string());
        for record in select(&records, filters) {
            if !sink.send(record.clone()) {
                break;
            }
        }
        Ok(())
    }
}
