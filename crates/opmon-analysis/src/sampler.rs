//! Semantic sampling: embed the top-K items, cluster them, and keep
//! near-centroid representatives plus a reserved share of outliers.

use std::collections::BTreeMap;
use std::time::Duration;

use opmon_core::{Platform, RawItem, SamplerConfig};

use crate::embeddings::Embedder;
use crate::error::AnalysisError;
use crate::kmeans::kmeans;
use crate::text::{normalize_whitespace, truncate_chars};
use crate::types::{Outcome, SampledItem};

/// Why an index was picked; lower variants survive trimming longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Pick {
    /// Nearest item of its cluster.
    Primary,
    Outlier,
    /// Additional in-cluster pick from the proportional quota.
    Quota,
}

/// Cluster count for `n` items: `floor(sqrt(n))` clamped to `[k_min, k_max]`.
#[must_use]
pub fn cluster_count(n: usize, k_min: usize, k_max: usize) -> usize {
    let k_max = k_max.max(k_min);
    n.isqrt().clamp(k_min, k_max)
}

/// Choose up to `target` indices from `embeddings`.
///
/// Returns `(index, representative)` pairs in ascending index order.
pub(crate) fn select_indices(
    embeddings: &[Vec<f32>],
    target: usize,
    config: &SamplerConfig,
) -> Vec<(usize, bool)> {
    let n = embeddings.len();
    if n <= target {
        return (0..n).map(|i| (i, true)).collect();
    }

    let k = cluster_count(n, config.k_min.max(1), config.k_max);
    if k >= n {
        return (0..target).map(|i| (i, true)).collect();
    }

    let clustering = kmeans(embeddings, k, config.seed);
    let distances = &clustering.distances;
    let by_distance = |a: &usize, b: &usize| distances[*a].total_cmp(&distances[*b]).then(a.cmp(b));

    let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in clustering.labels.iter().enumerate() {
        clusters.entry(label).or_default().push(idx);
    }
    for members in clusters.values_mut() {
        members.sort_by(by_distance);
    }

    // Proportional quotas, at least one per cluster.
    let mut quotas: BTreeMap<usize, usize> = clusters
        .iter()
        .map(|(&label, members)| {
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            let share = (target as f64 * members.len() as f64 / n as f64).round() as usize;
            (label, share.max(1))
        })
        .collect();
    let mut total: usize = quotas.values().sum();
    if total > target {
        let mut largest_first: Vec<usize> = clusters.keys().copied().collect();
        largest_first.sort_by(|a, b| clusters[b].len().cmp(&clusters[a].len()).then(a.cmp(b)));
        for label in largest_first {
            if total <= target {
                break;
            }
            if let Some(q) = quotas.get_mut(&label) {
                if *q > 1 {
                    *q -= 1;
                    total -= 1;
                }
            }
        }
    }

    let mut picks: BTreeMap<usize, Pick> = BTreeMap::new();
    for (label, members) in &clusters {
        let quota = quotas.get(label).copied().unwrap_or(1);
        for (rank, &idx) in members.iter().take(quota).enumerate() {
            picks.insert(idx, if rank == 0 { Pick::Primary } else { Pick::Quota });
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let outlier_budget = ((target as f64 * config.outlier_ratio).floor() as usize).min(target);
    let mut farthest_first: Vec<usize> = (0..n).collect();
    farthest_first.sort_by(|a, b| by_distance(b, a));
    let mut outliers = 0;
    for idx in farthest_first {
        if outliers >= outlier_budget {
            break;
        }
        if !picks.contains_key(&idx) {
            picks.insert(idx, Pick::Outlier);
            outliers += 1;
        }
    }

    if picks.len() > target {
        // Drop extra quota picks farthest-first, then the least remote
        // outliers, then primaries farthest-first.
        let mut ranked: Vec<(usize, Pick)> = picks.iter().map(|(&i, &p)| (i, p)).collect();
        ranked.sort_by(|(a, pa), (b, pb)| {
            pa.cmp(pb).then_with(|| match pa {
                Pick::Primary | Pick::Quota => by_distance(a, b),
                Pick::Outlier => by_distance(b, a),
            })
        });
        ranked.truncate(target);
        picks = ranked.into_iter().collect();
    }

    if picks.len() < target {
        let mut nearest_first: Vec<usize> = (0..n).collect();
        nearest_first.sort_by(by_distance);
        for idx in nearest_first {
            if picks.len() >= target {
                break;
            }
            picks.entry(idx).or_insert(Pick::Quota);
        }
    }

    picks
        .into_iter()
        .map(|(idx, pick)| (idx, pick != Pick::Outlier))
        .collect()
}

/// Engagement-ranked selection with a per-platform quota, used when semantic
/// sampling is switched off.
///
/// `items` must be in descending engagement order. Each platform gets
/// `max(1, limit / platforms)` slots, filled with its items that reach
/// `min_engagement` (or its top items when none do). Leftover slots go to
/// the most engaging items not yet chosen. Output keeps the input order.
#[must_use]
pub fn balanced_top_items(items: Vec<RawItem>, limit: usize, min_engagement: u64) -> Vec<RawItem> {
    let limit = limit.max(1);
    if items.len() <= limit {
        return items;
    }

    let mut by_platform: BTreeMap<Platform, Vec<usize>> = BTreeMap::new();
    for (idx, item) in items.iter().enumerate() {
        by_platform.entry(item.platform).or_default().push(idx);
    }
    let quota = (limit / by_platform.len()).max(1);

    let mut picked: Vec<usize> = Vec::with_capacity(limit);
    for members in by_platform.values() {
        let engaged: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&idx| items[idx].engagement_score() >= min_engagement)
            .collect();
        let pool = if engaged.is_empty() { members } else { &engaged };
        picked.extend(pool.iter().take(quota));
    }
    picked.truncate(limit);

    let mut chosen = vec![false; items.len()];
    for &idx in &picked {
        chosen[idx] = true;
    }
    for (idx, taken) in chosen.iter().enumerate() {
        if picked.len() >= limit {
            break;
        }
        if !taken {
            picked.push(idx);
        }
    }
    picked.sort_unstable();

    tracing::debug!(
        platforms = by_platform.len(),
        quota,
        kept = picked.len(),
        "platform-balanced selection"
    );

    let mut slots: Vec<Option<RawItem>> = items.into_iter().map(Some).collect();
    picked.into_iter().filter_map(|idx| slots[idx].take()).collect()
}

/// Reduces up to K cleaned items to at most `target_count` diverse ones.
pub struct SemanticSampler<'a> {
    embedder: Option<&'a dyn Embedder>,
    config: &'a SamplerConfig,
    timeout: Duration,
}

impl<'a> SemanticSampler<'a> {
    #[must_use]
    pub fn new(embedder: Option<&'a dyn Embedder>, config: &'a SamplerConfig, timeout: Duration) -> Self {
        Self {
            embedder,
            config,
            timeout,
        }
    }

    fn embedding_text(&self, item: &RawItem) -> String {
        let text = normalize_whitespace(item.visible_text());
        truncate_chars(&text, self.config.text_max_length).to_string()
    }

    async fn embed(&self, embedder: &dyn Embedder, items: &[RawItem]) -> Result<Vec<Vec<f32>>, AnalysisError> {
        let texts: Vec<String> = items.iter().map(|i| self.embedding_text(i)).collect();
        let embeddings = tokio::time::timeout(self.timeout, embedder.embed(&texts))
            .await
            .map_err(|_| AnalysisError::Timeout {
                operation: "embedding",
                secs: self.timeout.as_secs(),
            })??;

        if embeddings.len() != items.len() {
            return Err(AnalysisError::Tei(format!(
                "expected {} embeddings, got {}",
                items.len(),
                embeddings.len()
            )));
        }
        let dim = embeddings.first().map_or(0, Vec::len);
        if dim == 0 || embeddings.iter().any(|e| e.len() != dim) {
            return Err(AnalysisError::Tei("inconsistent embedding dimensions".to_string()));
        }
        Ok(embeddings)
    }

    /// Sample `items` (already in descending engagement order).
    ///
    /// Inputs no larger than the target pass through unchanged. Any embedding
    /// failure degrades to the first `target_count` items.
    pub async fn sample(&self, mut items: Vec<RawItem>) -> Outcome<Vec<SampledItem>> {
        let target = self.config.target_count.max(1);
        if items.len() <= target {
            return Outcome::Trusted(items.into_iter().map(SampledItem::representative).collect());
        }

        let Some(embedder) = self.embedder else {
            tracing::warn!(target, "no embedding oracle configured; keeping top items by engagement");
            items.truncate(target);
            return Outcome::Degraded(items.into_iter().map(SampledItem::representative).collect());
        };

        let embeddings = match self.embed(embedder, &items).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                tracing::warn!(error = %e, target, "embedding failed; keeping top items by engagement");
                items.truncate(target);
                return Outcome::Degraded(items.into_iter().map(SampledItem::representative).collect());
            }
        };

        let config = self.config.clone();
        let selection =
            tokio::task::spawn_blocking(move || select_indices(&embeddings, target, &config)).await;
        let selection = match selection {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "clustering task failed; keeping top items by engagement");
                items.truncate(target);
                return Outcome::Degraded(items.into_iter().map(SampledItem::representative).collect());
            }
        };

        let outliers = selection.iter().filter(|(_, rep)| !rep).count();
        tracing::info!(
            input = items.len(),
            sampled = selection.len(),
            outliers,
            "semantic sampling complete"
        );

        let mut slots: Vec<Option<RawItem>> = items.into_iter().map(Some).collect();
        let sampled = selection
            .into_iter()
            .filter_map(|(idx, representative)| {
                slots[idx]
                    .take()
                    .map(|item| SampledItem { item, representative })
            })
            .collect();
        Outcome::Trusted(sampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target: usize) -> SamplerConfig {
        SamplerConfig {
            target_count: target,
            ..SamplerConfig::default()
        }
    }

    /// Points spread over `groups` directions with small per-item jitter.
    fn grouped(n: usize, groups: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                let mut v = vec![0.0_f32; groups + 1];
                v[i % groups] = 1.0;
                #[allow(clippy::cast_precision_loss)]
                let jitter = (i as f32) * 0.001;
                v[groups] = jitter;
                v
            })
            .collect()
    }

    #[test]
    fn cluster_count_is_monotonic_and_bounded() {
        assert_eq!(cluster_count(4, 3, 10), 3);
        assert_eq!(cluster_count(25, 3, 10), 5);
        assert_eq!(cluster_count(200, 3, 10), 10);
        let counts: Vec<usize> = (1..300).map(|n| cluster_count(n, 3, 10)).collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn selection_respects_target_and_is_sorted() {
        let embeddings = grouped(120, 6);
        let picks = select_indices(&embeddings, 20, &config(20));
        assert_eq!(picks.len(), 20);
        assert!(picks.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn selection_reserves_outliers() {
        let mut embeddings = grouped(100, 4);
        // One item pointing somewhere no group does.
        embeddings[57] = vec![0.3, -0.6, 0.2, -0.7, 0.0];
        let picks = select_indices(&embeddings, 20, &config(20));
        let outliers: Vec<usize> = picks.iter().filter(|(_, rep)| !rep).map(|(i, _)| *i).collect();
        assert_eq!(outliers.len(), 2);
        assert!(picks.iter().any(|(i, _)| *i == 57), "remote item must be retained");
    }

    #[test]
    fn selection_is_deterministic() {
        let embeddings = grouped(90, 5);
        let a = select_indices(&embeddings, 15, &config(15));
        let b = select_indices(&embeddings, 15, &config(15));
        assert_eq!(a, b);
    }

    #[test]
    fn selection_covers_every_cluster() {
        let embeddings = grouped(100, 5);
        let picks = select_indices(&embeddings, 10, &config(10));
        let mut groups: Vec<usize> = picks.iter().map(|(i, _)| i % 5).collect();
        groups.sort_unstable();
        groups.dedup();
        assert_eq!(groups.len(), 5);
    }

    fn raw(platform: Platform, id: &str, upvotes: i64) -> RawItem {
        RawItem {
            platform,
            content_type: opmon_core::ContentType::Post,
            source_id: id.to_string(),
            title: None,
            content: Some(format!("post {id}")),
            author: None,
            url: None,
            metrics: [("upvotes".to_string(), upvotes)].into_iter().collect(),
            extra_fields: serde_json::Map::new(),
            published_at: None,
        }
    }

    fn ids(items: &[RawItem]) -> Vec<&str> {
        items.iter().map(|i| i.source_id.as_str()).collect()
    }

    #[test]
    fn balanced_selection_gives_each_platform_a_quota() {
        let mut items: Vec<RawItem> = (0..10)
            .map(|i| raw(Platform::Reddit, &format!("r{i}"), 100 - i))
            .collect();
        items.extend((0..3).map(|i| raw(Platform::Youtube, &format!("y{i}"), 10 - i)));

        let picked = balanced_top_items(items, 6, 5);
        assert_eq!(ids(&picked), vec!["r0", "r1", "r2", "y0", "y1", "y2"]);
    }

    #[test]
    fn balanced_selection_honors_min_engagement_and_fills_leftovers() {
        let mut items: Vec<RawItem> = (0..10)
            .map(|i| raw(Platform::Reddit, &format!("r{i}"), 100 - i))
            .collect();
        items.push(raw(Platform::Youtube, "y0", 10));
        items.push(raw(Platform::Youtube, "y1", 2));
        items.push(raw(Platform::Youtube, "y2", 1));

        let picked = balanced_top_items(items, 6, 5);
        assert_eq!(ids(&picked), vec!["r0", "r1", "r2", "r3", "r4", "y0"]);
    }

    #[test]
    fn balanced_selection_keeps_low_platforms_when_nothing_qualifies() {
        let mut items: Vec<RawItem> = (0..6)
            .map(|i| raw(Platform::Reddit, &format!("r{i}"), 100 - i))
            .collect();
        items.push(raw(Platform::X, "x0", 1));
        items.push(raw(Platform::X, "x1", 0));

        let picked = balanced_top_items(items, 4, 5);
        assert_eq!(ids(&picked), vec!["r0", "r1", "x0", "x1"]);
    }

    #[test]
    fn balanced_selection_of_small_input_is_identity() {
        let items = vec![raw(Platform::Reddit, "a", 1), raw(Platform::X, "b", 0)];
        assert_eq!(ids(&balanced_top_items(items, 5, 5)), vec!["a", "b"]);
    }

    #[test]
    fn small_input_is_identity() {
        let embeddings = grouped(8, 2);
        let picks = select_indices(&embeddings, 10, &config(10));
        assert_eq!(picks, (0..8).map(|i| (i, true)).collect::<Vec<_>>());
    }
}
