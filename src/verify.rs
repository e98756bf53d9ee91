//! Author verification against an external endpoint.
//!
//! Verification runs at ranking time and only annotates results; it never
//! reorders or drops them. A call that exceeds its deadline yields
//! [`Verification::TimedOut`] instead of failing the search.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::warn;

use crate::config::VerificationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    Verified,
    Unverified,
    TimedOut,
}

/// External identity check.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, identifier: &str) -> Result<bool>;
}

/// `GET {endpoint}?id=<identifier>` answering `{"verified": bool}`.
pub struct HttpVerifier {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    verified: bool,
}

impl HttpVerifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &VerificationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build verification HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn verify(&self, identifier: &str) -> Result<bool> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("id", identifier)])
            .send()
            .await
            .with_context(|| format!("Verification request failed for {}", identifier))?;
        if !resp.status().is_success() {
            bail!("Verification endpoint returned {}", resp.status());
        }
        let body: VerifyResponse = resp
            .json()
            .await
            .context("Invalid verification response")?;
        Ok(body.verified)
    }
}

/// Verify each distinct identifier concurrently, each under `timeout`.
pub async fn verify_all(
    verifier: Arc<dyn Verifier>,
    identifiers: impl IntoIterator<Item = String>,
    timeout: Duration,
) -> HashMap<String, Verification> {
    let mut tasks = JoinSet::new();
    let mut out = HashMap::new();
    for identifier in identifiers {
        if out.contains_key(&identifier) {
            continue;
        }
        out.insert(identifier.clone(), Verification::Unverified);
        let verifier = verifier.clone();
        tasks.spawn(async move {
            let outcome = match tokio::time::timeout(timeout, verifier.verify(&identifier)).await {
                Ok(Ok(true)) => Verification::Verified,
                Ok(Ok(false)) => Verification::Unverified,
                Ok(Err(e)) => {
                    warn!(identifier = %identifier, error = %e, "verification failed");
                    Verification::Unverified
                }
                Err(_) => {
                    warn!(identifier = %identifier, timeout = ?timeout, "verification timed out");
                    Verification::TimedOut
                }
            };
            (identifier, outcome)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        if let Ok((identifier, outcome)) = joined {
            out.insert(identifier, outcome);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted;

    #[async_trait]
    impl Verifier for Scripted {
        async fn verify(&self, identifier: &str) -> Result<bool> {
            match identifier {
                "good" => Ok(true),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(true)
                }
                "broken" => bail!("endpoint down"),
                _ => Ok(false),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes() {
        let ids = ["good", "bad", "slow", "broken", "good"].map(String::from);
        let results = verify_all(Arc::new(Scripted), ids, Duration::from_secs(10)).await;
        assert_eq!(results.len(), 4);
        assert_eq!(results["good"], Verification::Verified);
        assert_eq!(results["bad"], Verification::Unverified);
        assert_eq!(results["slow"], Verification::TimedOut);
        assert_eq!(results["broken"], Verification::Unverified);
    }
}
