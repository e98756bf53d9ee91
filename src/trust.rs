//! Process-wide trust score provider.
//!
//! Scores may be replaced at any time (from config, or by an external
//! updater); the search engine reads them once per attempt, at ranking time.

use std::collections::HashMap;
use std::sync::RwLock;

use passage_core::rank::TrustScores;

use crate::config::TrustConfig;

#[derive(Debug, Default)]
pub struct SharedTrustScores {
    scores: RwLock<HashMap<String, f64>>,
}

impl SharedTrustScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TrustConfig) -> Self {
        Self {
            scores: RwLock::new(config.scores.clone()),
        }
    }

    pub fn set(&self, author: impl Into<String>, score: f64) {
        if let Ok(mut scores) = self.scores.write() {
            scores.insert(author.into(), score);
        }
    }

    /// Swap in a whole new table.
    pub fn replace_all(&self, table: HashMap<String, f64>) {
        if let Ok(mut scores) = self.scores.write() {
            *scores = table;
        }
    }

    pub fn len(&self) -> usize {
        self.scores.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrustScores for SharedTrustScores {
    fn score(&self, author: &str) -> f64 {
        self.scores
            .read()
            .ok()
            .and_then(|s| s.get(author).copied())
            .unwrap_or(0.0)
    }
}
