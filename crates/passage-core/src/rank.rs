//! Trust-weighted ranking.
//!
//! Ranking runs once per attempt, after completion. It is a stable sort,
//! descending by the author's trust score; records with equal scores keep
//! their merge order. Unknown authors score `0.0`.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::ContentRecord;

/// Per-author trust score provider.
///
/// Read at ranking time only; implementations may update scores
/// asynchronously between attempts.
pub trait TrustScores: Send + Sync {
    fn score(&self, author: &str) -> f64;
}

/// Every author scores zero. Ranking with this preserves merge order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrust;

impl TrustScores for NoTrust {
    fn score(&self, _author: &str) -> f64 {
        0.0
    }
}

/// Fixed score table.
#[derive(Debug, Clone, Default)]
pub struct StaticTrustScores {
    scores: HashMap<String, f64>,
}

impl StaticTrustScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, author: impl Into<String>, score: f64) -> Self {
        self.scores.insert(author.into(), score);
        self
    }

    pub fn set(&mut self, author: impl Into<String>, score: f64) {
        self.scores.insert(author.into(), score);
    }
}

impl TrustScores for StaticTrustScores {
    fn score(&self, author: &str) -> f64 {
        self.scores.score(author)
    }
}

impl TrustScores for HashMap<String, f64> {
    fn score(&self, author: &str) -> f64 {
        self.get(author).copied().unwrap_or(0.0)
    }
}

/// A record with the trust score it was ranked by.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRecord {
    #[serde(flatten)]
    pub record: ContentRecord,
    pub trust: f64,
}

/// Stable descending sort by trust. NaN scores rank as zero.
pub fn rank(records: Vec<ContentRecord>, trust: &dyn TrustScores) -> Vec<RankedRecord> {
    let mut ranked: Vec<RankedRecord> = records
        .into_iter()
        .map(|record| {
            let score = trust.score(&record.author);
            RankedRecord {
                record,
                trust: if score.is_nan() { 0.0 } else { score },
            }
        })
        .collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.trust.total_cmp(&a.trust));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tags;

    fn rec(author: &str, content: &str) -> ContentRecord {
        ContentRecord {
            id: content.to_string(),
            author: author.into(),
            created_at: 1,
            kind: 1,
            tags: Tags::new(),
            content: content.into(),
        }
    }

    fn contents(ranked: &[RankedRecord]) -> Vec<&str> {
        ranked.iter().map(|r| r.record.content.as_str()).collect()
    }

    #[test]
    fn test_descending_by_trust() {
        let trust = StaticTrustScores::new().with("high", 0.9).with("mid", 0.5);
        let ranked = rank(
            vec![rec("low", "a"), rec("high", "b"), rec("mid", "c")],
            &trust,
        );
        assert_eq!(contents(&ranked), vec!["b", "c", "a"]);
        assert_eq!(ranked[2].trust, 0.0);
    }

    #[test]
    fn test_ties_keep_prior_order() {
        let trust = StaticTrustScores::new().with("x", 1.0).with("y", 1.0);
        let ranked = rank(
            vec![rec("x", "1"), rec("z", "2"), rec("y", "3"), rec("x", "4")],
            &trust,
        );
        assert_eq!(contents(&ranked), vec!["1", "3", "4", "2"]);
    }

    #[test]
    fn test_no_trust_preserves_order() {
        let ranked = rank(vec![rec("a", "1"), rec("b", "2"), rec("c", "3")], &NoTrust);
        assert_eq!(contents(&ranked), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_nan_and_negative_scores() {
        let mut map = HashMap::new();
        map.insert("nan".to_string(), f64::NAN);
        map.insert("neg".to_string(), -1.0);
        let ranked = rank(vec![rec("neg", "1"), rec("nan", "2"), rec("other", "3")], &map);
        assert_eq!(contents(&ranked), vec!["2", "3", "1"]);
    }
}
