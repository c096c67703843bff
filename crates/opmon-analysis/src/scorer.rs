//! Map phase: batched per-item sentiment scoring through the text oracle.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use opmon_core::{RawItem, ScorerConfig};
use serde_json::Value;

use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts;
use crate::repair::generate_validated;
use crate::text::{normalize_whitespace, strip_code_blocks, truncate_chars};
use crate::types::{Outcome, SampledItem, SentimentResult};

/// Score assigned when a batch cannot be scored.
pub const NEUTRAL_SCORE: u8 = 50;

const MAX_KEY_PHRASES: usize = 3;
const MAX_PHRASE_CHARS: usize = 80;

/// `max(1, engagement / 10 + 1)`.
#[must_use]
pub fn engagement_weight(item: &RawItem) -> u64 {
    (item.engagement_score() / 10).saturating_add(1)
}

/// Validated score for one batch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScoredText {
    pub score: u8,
    pub key_phrases: Vec<String>,
}

fn as_score(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n,
        _ => return None,
    };
    let integer = n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .map(|f| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let v = f as u64;
                v
            })
    })?;
    u8::try_from(integer).ok().filter(|s| *s <= 100)
}

/// Check that every phrase occurs verbatim in `source`, at most three of them.
fn grounded_phrases(raw: Option<&Value>, source: &str) -> Result<Vec<String>, String> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let list = raw
        .as_array()
        .ok_or_else(|| "key_phrases must be an array".to_string())?;
    if list.len() > MAX_KEY_PHRASES {
        return Err(format!("more than {MAX_KEY_PHRASES} key phrases"));
    }
    let mut phrases: Vec<String> = Vec::with_capacity(list.len());
    for phrase in list {
        let phrase = phrase
            .as_str()
            .ok_or_else(|| "key_phrases entries must be strings".to_string())?
            .trim();
        if phrase.is_empty() {
            return Err("empty key phrase".to_string());
        }
        if phrase.chars().count() > MAX_PHRASE_CHARS {
            return Err(format!("key phrase longer than {MAX_PHRASE_CHARS} characters"));
        }
        if !source.contains(phrase) {
            return Err(format!("key phrase {phrase:?} not found in text"));
        }
        if !phrases.iter().any(|p| p == phrase) {
            phrases.push(phrase.to_string());
        }
    }
    Ok(phrases)
}

/// Parse and check a scoring response for `sources` (the raw item texts, in
/// prompt order). Key phrases must be verbatim substrings of their source.
///
/// Accepts `{"scores": [...]}` or a bare array. Entries may come in any
/// order; the result is in index order.
pub(crate) fn validate_scores(raw: &str, sources: &[&str]) -> Result<Vec<ScoredText>, String> {
    let root: Value =
        serde_json::from_str(strip_code_blocks(raw)).map_err(|e| format!("invalid JSON: {e}"))?;
    let entries = match &root {
        Value::Array(entries) => entries,
        Value::Object(map) => map
            .get("scores")
            .and_then(Value::as_array)
            .ok_or_else(|| "missing \"scores\" array".to_string())?,
        _ => return Err("expected a JSON object with a \"scores\" array".to_string()),
    };

    let expected = sources.len();
    if entries.len() != expected {
        return Err(format!("expected {expected} scores, got {}", entries.len()));
    }

    let mut slots: Vec<Option<ScoredText>> = vec![None; expected];
    let mut seen = BTreeSet::new();
    for (position, entry) in entries.iter().enumerate() {
        let obj = entry
            .as_object()
            .ok_or_else(|| format!("entry {position} is not an object"))?;
        let index = obj
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| format!("entry {position} has no integer \"index\""))?;
        if index == 0 || index > expected {
            return Err(format!("index {index} outside 1..={expected}"));
        }
        if !seen.insert(index) {
            return Err(format!("duplicate index {index}"));
        }
        let score = obj
            .get("score")
            .and_then(as_score)
            .ok_or_else(|| format!("index {index}: \"score\" must be an integer in 0..=100"))?;
        let key_phrases = grounded_phrases(obj.get("key_phrases"), sources[index - 1])
            .map_err(|e| format!("index {index}: {e}"))?;
        slots[index - 1] = Some(ScoredText { score, key_phrases });
    }

    // Count and uniqueness checks above guarantee every slot is filled.
    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| format!("missing index {}", i + 1)))
        .collect()
}

/// Scores of every item, in input order, plus batch bookkeeping.
#[derive(Debug, Clone)]
pub struct ScoredItems {
    pub results: Vec<SentimentResult>,
    pub total_batches: usize,
    pub degraded_batches: usize,
}

pub struct SentimentScorer<'a> {
    llm: &'a dyn TextGenerator,
    config: &'a ScorerConfig,
    keyword: &'a str,
    timeout: Duration,
}

impl<'a> SentimentScorer<'a> {
    #[must_use]
    pub fn new(
        llm: &'a dyn TextGenerator,
        config: &'a ScorerConfig,
        keyword: &'a str,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            config,
            keyword,
            timeout,
        }
    }

    fn prompt_text(&self, item: &RawItem) -> String {
        let text = normalize_whitespace(item.visible_text());
        let truncated = truncate_chars(&text, self.config.text_limit);
        if truncated.len() < text.len() {
            format!("{truncated}...")
        } else {
            text
        }
    }

    async fn score_batch(&self, batch_no: usize, batch: &[SampledItem]) -> Outcome<Vec<SentimentResult>> {
        let prompt_texts: Vec<String> = batch.iter().map(|s| self.prompt_text(&s.item)).collect();
        let sources: Vec<&str> = batch.iter().map(|s| s.item.visible_text()).collect();

        let request = GenerationRequest::new(
            prompts::SENTIMENT_SYSTEM,
            prompts::sentiment_user(self.keyword, &prompt_texts),
        )
        .json()
        .with_max_tokens(1_200);

        let validated = generate_validated(
            self.llm,
            &request,
            prompts::JSON_REPAIR_SYSTEM,
            self.timeout,
            "sentiment scoring",
            |raw| validate_scores(raw, &sources),
        )
        .await;

        let build = |scored: Option<Vec<ScoredText>>| -> Vec<SentimentResult> {
            let mut scored = scored.map(Vec::into_iter);
            batch
                .iter()
                .map(|s| {
                    let entry = scored.as_mut().and_then(|it| it.next());
                    let (score, key_phrases) =
                        entry.map_or((NEUTRAL_SCORE, Vec::new()), |e| (e.score, e.key_phrases));
                    SentimentResult {
                        source_id: s.item.source_id.clone(),
                        score,
                        key_phrases,
                        platform: s.item.platform,
                        engagement_weight: engagement_weight(&s.item),
                    }
                })
                .collect()
        };

        match validated {
            Ok(scored) => {
                tracing::debug!(batch = batch_no, size = batch.len(), "sentiment batch scored");
                Outcome::Trusted(build(Some(scored)))
            }
            Err(e) => {
                tracing::warn!(batch = batch_no, size = batch.len(), error = %e, "sentiment batch fell back to neutral");
                Outcome::Degraded(build(None))
            }
        }
    }

    /// Score `items` in batches, at most `max_concurrent` in flight.
    ///
    /// Always returns exactly one result per item, in input order.
    pub async fn score(&self, items: &[SampledItem]) -> ScoredItems {
        let batch_size = self.config.batch_size.max(1);
        let outcomes: Vec<Outcome<Vec<SentimentResult>>> = stream::iter(items.chunks(batch_size).enumerate())
            .map(|(batch_no, batch)| self.score_batch(batch_no, batch))
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let total_batches = outcomes.len();
        let degraded_batches = outcomes.iter().filter(|o| o.is_degraded()).count();
        let results: Vec<SentimentResult> = outcomes.into_iter().flat_map(Outcome::into_inner).collect();

        tracing::info!(
            items = results.len(),
            total_batches,
            degraded_batches,
            "sentiment scoring complete"
        );

        ScoredItems {
            results,
            total_batches,
            degraded_batches,
        }
    }
}
