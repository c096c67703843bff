//! Time-decayed engagement "heat" of a topic.
//!
//! The accumulator observes every cleaned item once during the reducer pass,
//! so heat covers the full (unsampled) stream and never depends on the LLM
//! stages. It keeps one `f64` per item for the 90th percentile.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use opmon_core::{Platform, RawItem};

/// Engagement half-life in hours.
const HALF_LIFE_HOURS: f64 = 24.0;

/// Average decayed engagement that maps to a full engagement component.
const ENGAGEMENT_SCALE: f64 = 1_000_000.0;

/// Split of the engagement component between the mean and the p90.
const MEAN_SHARE: f64 = 0.7;
const P90_SHARE: f64 = 0.3;

const ENGAGEMENT_WEIGHT: f64 = 0.6;
const VOLUME_WEIGHT: f64 = 0.25;
const PLATFORM_WEIGHT: f64 = 0.15;

/// Decay weight `exp(-ln2/24 * age_hours)` for an item published at `published_at`.
///
/// Unknown and future timestamps are treated as age zero.
#[must_use]
pub fn decay_weight(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published_at) = published_at else {
        return 1.0;
    };
    #[allow(clippy::cast_precision_loss)]
    let age_hours = ((now - published_at).num_seconds() as f64 / 3600.0).max(0.0);
    (-(std::f64::consts::LN_2 / HALF_LIFE_HOURS) * age_hours).exp()
}

/// Streaming heat-index accumulator.
#[derive(Debug, Clone)]
pub struct HeatAccumulator {
    now: DateTime<Utc>,
    decayed: Vec<f64>,
    decayed_total: f64,
    platforms: BTreeSet<Platform>,
}

impl HeatAccumulator {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            decayed: Vec::new(),
            decayed_total: 0.0,
            platforms: BTreeSet::new(),
        }
    }

    pub fn observe(&mut self, item: &RawItem) {
        #[allow(clippy::cast_precision_loss)]
        let engagement = item.engagement_score() as f64;
        let decayed = engagement * decay_weight(item.published_at, self.now);
        self.decayed_total += decayed;
        self.decayed.push(decayed);
        self.platforms.insert(item.platform);
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.decayed.len()
    }

    /// Decayed engagement at the 90th percentile (nearest rank, rounded down).
    fn p90(&self) -> f64 {
        let mut sorted = self.decayed.clone();
        sorted.sort_unstable_by(f64::total_cmp);
        let index = (sorted.len() * 9 / 10).saturating_sub(1);
        sorted.get(index).copied().unwrap_or(0.0)
    }

    /// Final heat in `[0, 100]`, rounded to two decimals.
    ///
    /// `expected_count` and `expected_platforms` describe what the collectors
    /// were asked for; when absent the volume and coverage components are full.
    #[must_use]
    pub fn finish(&self, expected_count: usize, expected_platforms: &[Platform]) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let average = self.decayed_total / count as f64;
        let scaled = |v: f64| v.max(0.0).ln_1p() / ENGAGEMENT_SCALE.ln_1p() * 100.0;
        let engagement = (MEAN_SHARE * scaled(average) + P90_SHARE * scaled(self.p90())).min(100.0);

        #[allow(clippy::cast_precision_loss)]
        let volume = if expected_count == 0 {
            100.0
        } else {
            (count as f64 / expected_count as f64).min(1.0) * 100.0
        };

        let requested: BTreeSet<Platform> = expected_platforms.iter().copied().collect();
        #[allow(clippy::cast_precision_loss)]
        let coverage = if requested.is_empty() {
            100.0
        } else {
            let seen = self.platforms.intersection(&requested).count();
            (seen as f64 / requested.len() as f64).min(1.0) * 100.0
        };

        let heat = ENGAGEMENT_WEIGHT * engagement + VOLUME_WEIGHT * volume + PLATFORM_WEIGHT * coverage;
        (heat.clamp(0.0, 100.0) * 100.0).round() / 100.0
    }
}
