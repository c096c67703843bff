//! Engagement-weighted overall sentiment and platform shares.

use std::collections::BTreeMap;

use opmon_core::Platform;

use crate::scorer::NEUTRAL_SCORE;
use crate::types::SentimentResult;

/// `round(sum(score * weight) / sum(weight))`, rounding halves up.
///
/// Exact integer arithmetic, so the result always lies within the range of
/// the input scores. Empty input is neutral.
#[must_use]
pub fn weighted_score(results: &[SentimentResult]) -> u8 {
    let (numerator, denominator) = results.iter().fold((0_u128, 0_u128), |(num, den), r| {
        let weight = u128::from(r.engagement_weight.max(1));
        (num + u128::from(r.score) * weight, den + weight)
    });
    if denominator == 0 {
        return NEUTRAL_SCORE;
    }
    let rounded = (2 * numerator + denominator) / (2 * denominator);
    u8::try_from(rounded).map_or(100, |s| s.min(100))
}

/// Whole-number percentage per platform, summing to exactly 100.
///
/// Uses the largest-remainder method; ties go to the platform that sorts
/// first. Platforms with a zero count are omitted.
#[must_use]
pub fn platform_distribution(counts: &BTreeMap<Platform, usize>) -> BTreeMap<Platform, u32> {
    let total: usize = counts.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }

    let mut shares: Vec<(Platform, u32, usize)> = counts
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(&platform, &count)| {
            let scaled = count * 100;
            let floor = u32::try_from(scaled / total).unwrap_or(100);
            (platform, floor, scaled % total)
        })
        .collect();

    let assigned: u32 = shares.iter().map(|(_, floor, _)| floor).sum();
    let mut leftover = 100_u32.saturating_sub(assigned);

    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by(|&a, &b| shares[b].2.cmp(&shares[a].2).then(shares[a].0.cmp(&shares[b].0)));
    for idx in by_remainder {
        if leftover == 0 {
            break;
        }
        shares[idx].1 += 1;
        leftover -= 1;
    }

    shares
        .into_iter()
        .map(|(platform, percent, _)| (platform, percent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: u8, weight: u64) -> SentimentResult {
        SentimentResult {
            source_id: format!("{score}-{weight}"),
            score,
            key_phrases: vec![],
            platform: Platform::Reddit,
            engagement_weight: weight,
        }
    }

    #[test]
    fn empty_is_neutral() {
        assert_eq!(weighted_score(&[]), 50);
    }

    #[test]
    fn equal_weights_average() {
        let results = [result(80, 1), result(20, 1), result(50, 1)];
        assert_eq!(weighted_score(&results), 50);
    }

    #[test]
    fn heavy_item_pulls_score_and_rounds_half_up() {
        // (800 + 20 + 50) / 12 = 72.5
        let results = [result(80, 10), result(20, 1), result(50, 1)];
        assert_eq!(weighted_score(&results), 73);
    }

    #[test]
    fn stays_within_score_range() {
        let results = [result(61, u64::MAX), result(64, u64::MAX), result(62, 3)];
        let s = weighted_score(&results);
        assert!((61..=64).contains(&s), "got {s}");
    }

    #[test]
    fn distribution_sums_to_one_hundred() {
        let counts: BTreeMap<Platform, usize> =
            [(Platform::Reddit, 1), (Platform::Youtube, 1), (Platform::X, 1)].into_iter().collect();
        let dist = platform_distribution(&counts);
        assert_eq!(dist.values().sum::<u32>(), 100);
        assert_eq!(dist[&Platform::Reddit], 34);
        assert_eq!(dist[&Platform::Youtube], 33);
    }

    #[test]
    fn distribution_skips_empty_platforms() {
        let counts: BTreeMap<Platform, usize> =
            [(Platform::Reddit, 7), (Platform::X, 0)].into_iter().collect();
        let dist = platform_distribution(&counts);
        assert_eq!(dist.len(), 1);
        assert_eq!(dist[&Platform::Reddit], 100);
        assert!(platform_distribution(&BTreeMap::new()).is_empty());
    }
}
