use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use opmon_core::{Platform, RawItem};
use serde::{Deserialize, Serialize};

/// Result of an oracle-backed stage.
///
/// `Trusted` values came from a validated model response (possibly after the
/// single repair round). `Degraded` values are deterministic fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Trusted(T),
    Degraded(T),
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Outcome::Trusted(v) | Outcome::Degraded(v) => v,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Trusted(v) | Outcome::Degraded(v) => v,
        }
    }
}

/// An item picked by the semantic sampler.
#[derive(Debug, Clone)]
pub struct SampledItem {
    pub item: RawItem,
    /// `true` for near-centroid picks, `false` for retained outliers.
    pub representative: bool,
}

impl SampledItem {
    #[must_use]
    pub fn representative(item: RawItem) -> Self {
        Self {
            item,
            representative: true,
        }
    }
}

/// Per-item sentiment produced by the map phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub source_id: String,
    /// Integer in `[0, 100]`.
    pub score: u8,
    /// At most three phrases copied verbatim from the item text.
    pub key_phrases: Vec<String>,
    pub platform: Platform,
    pub engagement_weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opinion {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub points: Vec<String>,
}

/// Bucketed sentiment counts: positive >= 60, neutral 40-59, negative < 40.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentDistribution {
    #[must_use]
    pub fn from_results(results: &[SentimentResult]) -> Self {
        let mut dist = Self::default();
        for r in results {
            match r.score {
                60.. => dist.positive += 1,
                40..=59 => dist.neutral += 1,
                _ => dist.negative += 1,
            }
        }
        dist
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }
}

/// Which stages fell back to deterministic output, plus reducer bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub kept_items: usize,
    pub rejected: BTreeMap<String, usize>,
    pub sampled_items: usize,
    pub sampler_degraded: bool,
    pub degraded_batches: usize,
    pub total_batches: usize,
    pub clusterer_degraded: bool,
    pub mindmap_degraded: bool,
}

/// The terminal artifact of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sentiment_score: u8,
    pub key_opinions: Vec<Opinion>,
    pub summary: String,
    pub mermaid_code: String,
    pub heat_index: f64,
    pub total_items: usize,
    /// Platform -> whole percentage; values sum to 100.
    pub platform_distribution: BTreeMap<Platform, u32>,
    pub analyzed_at: DateTime<Utc>,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: u8) -> SentimentResult {
        SentimentResult {
            source_id: format!("id-{score}"),
            score,
            key_phrases: vec![],
            platform: Platform::Reddit,
            engagement_weight: 1,
        }
    }

    #[test]
    fn distribution_buckets_on_boundaries() {
        let results: Vec<_> = [0, 39, 40, 59, 60, 100].into_iter().map(result).collect();
        let dist = SentimentDistribution::from_results(&results);
        assert_eq!(dist.negative, 2);
        assert_eq!(dist.neutral, 2);
        assert_eq!(dist.positive, 2);
        assert_eq!(dist.total(), 6);
    }

    #[test]
    fn outcome_exposes_value_either_way() {
        let trusted = Outcome::Trusted(3);
        let degraded = Outcome::Degraded(4);
        assert!(!trusted.is_degraded());
        assert!(degraded.is_degraded());
        assert_eq!(*trusted.value(), 3);
        assert_eq!(degraded.into_inner(), 4);
    }
}
