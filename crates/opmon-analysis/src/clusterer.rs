//! Reduce phase: synthesize grounded opinion clusters and a summary.

use std::time::Duration;

use opmon_core::ClusterConfig;
use serde_json::Value;

use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts;
use crate::repair::generate_validated;
use crate::text::{extract_points, normalize_whitespace, sanitize_point, strip_code_blocks, truncate_chars};
use crate::types::{Opinion, Outcome, SampledItem, SentimentDistribution, SentimentResult};

/// Title used by the first fallback opinion.
pub const UNAVAILABLE_TITLE: &str = "Analysis unavailable";

const MAX_TITLE_WORDS: usize = 5;
const MIN_POINTS: usize = 2;
const MAX_POINTS: usize = 4;
const EXTRACTED_POINTS: usize = 3;
const MAX_POINT_CHARS: usize = 80;
const MIN_SUMMARY_SENTENCES: usize = 3;
const MIN_SUMMARY_CHARS: usize = 180;

/// Opinions plus the narrative summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Clusters {
    pub opinions: Vec<Opinion>,
    pub summary: String,
}

/// How many opinions to ask for, given `n` scored items.
///
/// Starts at `opinion_count_min` and adds one per threshold that `n`
/// exceeds, capped at `opinion_count_max`. Without thresholds the count is
/// 3 clamped into the configured range.
#[must_use]
pub fn target_count(n: usize, config: &ClusterConfig) -> usize {
    let min = config.opinion_count_min.max(1);
    let max = config.opinion_count_max.max(min);

    let mut thresholds: Vec<usize> = config.opinion_count_thresholds.iter().copied().filter(|t| *t > 0).collect();
    thresholds.sort_unstable();
    thresholds.dedup();
    if thresholds.is_empty() {
        return 3.clamp(min, max);
    }

    let mut count = min;
    for threshold in thresholds {
        if n <= threshold {
            return count.min(max);
        }
        count += 1;
    }
    max
}

fn sentence_markers(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(c, '.' | '!' | '?' | '。' | '！' | '？'))
        .count()
}

fn short_title(title: &str) -> String {
    title
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sanitized points, topped up from the description when fewer than
/// [`MIN_POINTS`] survive. `None` if even that leaves too few.
fn normalize_points(raw: Option<&Value>, description: &str) -> Option<Vec<String>> {
    let mut points: Vec<String> = Vec::new();
    if let Some(Value::Array(list)) = raw {
        for point in list.iter().filter_map(Value::as_str) {
            let point = sanitize_point(point, MAX_POINT_CHARS);
            if !point.is_empty() && !points.contains(&point) {
                points.push(point);
            }
        }
    }
    if points.len() < MIN_POINTS {
        let target = EXTRACTED_POINTS.max(points.len() + MIN_POINTS);
        for point in extract_points(description, target, MAX_POINT_CHARS) {
            if points.len() >= EXTRACTED_POINTS {
                break;
            }
            if !points.contains(&point) {
                points.push(point);
            }
        }
    }
    if points.len() < MIN_POINTS {
        return None;
    }
    points.truncate(MAX_POINTS);
    Some(points)
}

/// Parse, check, and normalize a clustering response.
pub(crate) fn validate_clusters(raw: &str, expected: usize) -> Result<Clusters, String> {
    let root: Value =
        serde_json::from_str(strip_code_blocks(raw)).map_err(|e| format!("invalid JSON: {e}"))?;
    let obj = root
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let list = obj
        .get("key_opinions")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing \"key_opinions\" array".to_string())?;
    if list.len() != expected {
        return Err(format!("expected {expected} key_opinions, got {}", list.len()));
    }

    let mut opinions = Vec::with_capacity(list.len());
    for (i, entry) in list.iter().enumerate() {
        let entry = entry
            .as_object()
            .ok_or_else(|| format!("key_opinions[{i}] is not an object"))?;
        let title = entry
            .get("title")
            .and_then(Value::as_str)
            .map(normalize_whitespace)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| format!("key_opinions[{i}] has an empty title"))?;
        let description = entry
            .get("description")
            .and_then(Value::as_str)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| format!("key_opinions[{i}] has an empty description"))?;
        let points = entry.get("points");
        if let Some(points) = points {
            let all_strings = points
                .as_array()
                .is_some_and(|list| list.iter().all(Value::is_string));
            if !all_strings {
                return Err(format!("key_opinions[{i}].points must be a list of strings"));
            }
        }
        let points = normalize_points(points, &description).ok_or_else(|| {
            format!("key_opinions[{i}] needs at least {MIN_POINTS} distinct points")
        })?;
        opinions.push(Opinion {
            title: short_title(&title),
            points,
            description,
        });
    }

    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if summary.is_empty() {
        return Err("summary is empty".to_string());
    }
    if sentence_markers(summary) < MIN_SUMMARY_SENTENCES && summary.chars().count() < MIN_SUMMARY_CHARS {
        return Err(format!(
            "summary too short: need at least {MIN_SUMMARY_SENTENCES} sentences or {MIN_SUMMARY_CHARS} characters"
        ));
    }

    Ok(Clusters {
        opinions,
        summary: summary.to_string(),
    })
}

fn share(part: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        (part * 100 + total / 2) / total
    }
}

/// Deterministic clusters built only from the sentiment counts.
///
/// Always exactly `opinion_count_min` opinions, the first being the
/// [`UNAVAILABLE_TITLE`] placeholder.
#[must_use]
pub fn fallback_clusters(keyword: &str, dist: SentimentDistribution, config: &ClusterConfig) -> Clusters {
    let count = config.opinion_count_min.max(1).min(config.opinion_count_max.max(1));
    let total = dist.total();

    let candidates = [
        Opinion {
            title: UNAVAILABLE_TITLE.to_string(),
            description: "Opinion clustering could not be completed for this run.".to_string(),
            points: vec![
                "Automatic clustering failed".to_string(),
                "Per-item sentiment is still reported".to_string(),
            ],
        },
        Opinion {
            title: "Sentiment balance".to_string(),
            description: format!(
                "{} positive, {} neutral and {} negative items were scored.",
                dist.positive, dist.neutral, dist.negative
            ),
            points: vec![
                format!("{}% positive", share(dist.positive, total)),
                format!("{}% negative", share(dist.negative, total)),
            ],
        },
        Opinion {
            title: "Positive reactions".to_string(),
            description: format!("{} items scored 60 or above.", dist.positive),
            points: vec![
                format!("{} positive items", dist.positive),
                format!("{}% of scored items", share(dist.positive, total)),
            ],
        },
        Opinion {
            title: "Negative reactions".to_string(),
            description: format!("{} items scored below 40.", dist.negative),
            points: vec![
                format!("{} negative items", dist.negative),
                format!("{}% of scored items", share(dist.negative, total)),
            ],
        },
        Opinion {
            title: "Neutral or mixed reactions".to_string(),
            description: format!("{} items scored between 40 and 59.", dist.neutral),
            points: vec![
                format!("{} neutral items", dist.neutral),
                format!("{}% of scored items", share(dist.neutral, total)),
            ],
        },
        Opinion {
            title: "Sample coverage".to_string(),
            description: format!("{total} items were scored in total."),
            points: vec![
                format!("{total} scored items"),
                "Viewpoint grouping unavailable".to_string(),
            ],
        },
    ];

    let tone = if dist.positive > dist.negative && dist.positive >= dist.neutral {
        "positive"
    } else if dist.negative > dist.positive && dist.negative >= dist.neutral {
        "negative"
    } else {
        "neutral or mixed"
    };
    let summary = format!(
        "Opinion clustering for \"{keyword}\" was unavailable, so this report relies on sentiment counts only. \
         {total} items were scored: {} positive, {} neutral and {} negative. \
         The overall tone leans {tone}. \
         Individual viewpoints could not be grouped for this run.",
        dist.positive, dist.neutral, dist.negative
    );

    Clusters {
        opinions: candidates.into_iter().take(count).collect(),
        summary,
    }
}

pub struct OpinionClusterer<'a> {
    llm: &'a dyn TextGenerator,
    config: &'a ClusterConfig,
    timeout: Duration,
}

impl<'a> OpinionClusterer<'a> {
    #[must_use]
    pub fn new(llm: &'a dyn TextGenerator, config: &'a ClusterConfig, timeout: Duration) -> Self {
        Self {
            llm,
            config,
            timeout,
        }
    }

    /// Cluster `results`; `items` supplies the excerpt text for each result
    /// (same order).
    pub async fn cluster(
        &self,
        keyword: &str,
        report_language: &str,
        results: &[SentimentResult],
        items: &[SampledItem],
    ) -> Outcome<Clusters> {
        let dist = SentimentDistribution::from_results(results);
        let target = target_count(results.len(), self.config);

        let excerpts: Vec<String> = items
            .iter()
            .map(|s| {
                let text = normalize_whitespace(s.item.visible_text());
                truncate_chars(&text, self.config.text_limit).to_string()
            })
            .filter(|t| !t.is_empty())
            .collect();
        let mut phrases: Vec<String> = Vec::new();
        for phrase in results.iter().flat_map(|r| r.key_phrases.iter()) {
            if !phrases.contains(phrase) {
                phrases.push(phrase.clone());
            }
        }

        let report_language = match report_language.trim() {
            "" => "auto",
            lang => lang,
        };
        let request = GenerationRequest::new(
            prompts::CLUSTERING_SYSTEM,
            prompts::clustering_user(keyword, &excerpts, &phrases, dist, target, report_language),
        )
        .json()
        .with_temperature(0.3);

        match generate_validated(
            self.llm,
            &request,
            prompts::JSON_REPAIR_SYSTEM,
            self.timeout,
            "opinion clustering",
            |raw| validate_clusters(raw, target),
        )
        .await
        {
            Ok(clusters) => {
                tracing::info!(opinions = clusters.opinions.len(), target, "opinion clustering complete");
                Outcome::Trusted(clusters)
            }
            Err(e) => {
                tracing::warn!(error = %e, target, "opinion clustering fell back to distribution summary");
                Outcome::Degraded(fallback_clusters(keyword, dist, self.config))
            }
        }
    }
}
