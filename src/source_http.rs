//! HTTP source.
//!
//! `POST {url}` with body `{"filters": [...]}`; the response is a JSON array
//! of records in either tag form. Records without an id get their content
//! hash. The per-source timeout is enforced by the orchestrator.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use passage_core::models::{ContentRecord, Filter};

use crate::source::{RecordSink, Source};

pub struct HttpSource {
    id: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    filters: &'a [Filter],
}

impl HttpSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Source for HttpSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "http"
    }

    async fn query(&self, filters: &[Filter], sink: RecordSink) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&QueryBody { filters })
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("{} returned {}: {}", self.url, status, body);
        }

        let records: Vec<ContentRecord> = resp
            .json()
            .await
            .with_context(|| format!("Invalid record list from {}", self.url))?;

        for record in records {
            if !sink.send(record.with_computed_id()) {
                break;
            }
        }
        Ok(())
    }
}
