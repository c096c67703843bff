//! Pipeline orchestration.
//!
//! One run reads the item stream once (cleaning, top-K selection and heat
//! accumulation together), then samples, scores, clusters and draws the
//! mindmap. Only unreadable or empty input is fatal; every oracle failure
//! degrades to a deterministic fallback recorded in [`Diagnostics`].

use std::convert::Infallible;
use std::time::Duration;

use chrono::Utc;
use opmon_core::{AppConfig, RawItem, RunParams};

use crate::aggregate::{platform_distribution, weighted_score};
use crate::clusterer::OpinionClusterer;
use crate::embeddings::Embedder;
use crate::error::AnalysisError;
use crate::filter::ContentFilter;
use crate::heat::HeatAccumulator;
use crate::llm::TextGenerator;
use crate::mindmap::MindmapGenerator;
use crate::reducer::StreamReducer;
use crate::sampler::{balanced_top_items, SemanticSampler};
use crate::scorer::SentimentScorer;
use crate::types::{AnalysisResult, Diagnostics, Outcome, SampledItem};

/// Configured analysis pipeline with its oracles.
pub struct Pipeline<'a> {
    config: &'a AppConfig,
    llm: &'a dyn TextGenerator,
    embedder: Option<&'a dyn Embedder>,
    filter: Option<ContentFilter>,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(config: &'a AppConfig, llm: &'a dyn TextGenerator) -> Self {
        Self {
            config,
            llm,
            embedder: None,
            filter: None,
        }
    }

    /// Enable semantic sampling through `embedder`. Without one, sampling
    /// keeps the top items by engagement.
    #[must_use]
    pub fn with_embedder(mut self, embedder: &'a dyn Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Replace the cleaning policy built from the reducer config.
    #[must_use]
    pub fn with_filter(mut self, filter: ContentFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.config.oracle.llm_timeout_secs)
    }

    /// Run the whole analysis over `items`.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::EmptyInput`] if `items` yields nothing.
    /// - [`AnalysisError::NoValidItems`] if every item is rejected by cleaning.
    pub async fn run<I>(&self, items: I, params: &RunParams) -> Result<AnalysisResult, AnalysisError>
    where
        I: IntoIterator<Item = RawItem>,
    {
        self.run_stream(items.into_iter().map(Ok::<_, Infallible>), params)
            .await
    }

    /// Like [`run`](Self::run) over a fallible stream, such as records parsed
    /// lazily from a file. The stream is consumed before any oracle call.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::Input`] on the first failed record.
    /// - Otherwise as [`run`](Self::run).
    pub async fn run_stream<I, E>(
        &self,
        items: I,
        params: &RunParams,
    ) -> Result<AnalysisResult, AnalysisError>
    where
        I: IntoIterator<Item = Result<RawItem, E>>,
        E: std::fmt::Display,
    {
        let now = Utc::now();
        let default_filter;
        let filter = if let Some(filter) = &self.filter {
            filter
        } else {
            default_filter = ContentFilter::new(&self.config.reducer, &params.target_language);
            &default_filter
        };

        let mut heat = HeatAccumulator::new(now);
        let mut reducer = StreamReducer::new(filter, self.config.reducer.capacity);
        for (seen, item) in items.into_iter().enumerate() {
            let item = item.map_err(|e| AnalysisError::Input {
                seen,
                message: e.to_string(),
            })?;
            reducer.push_observed(item, |cleaned| heat.observe(cleaned));
        }
        let reduced = reducer.finish();
        let stats = reduced.stats;

        if stats.seen == 0 {
            return Err(AnalysisError::EmptyInput);
        }
        if reduced.items.is_empty() {
            return Err(AnalysisError::NoValidItems {
                total: stats.seen,
                rejected: stats.rejected_total(),
            });
        }
        let kept_items = reduced.items.len();

        let sampled = if params.semantic_sampling {
            let sampler = SemanticSampler::new(
                self.embedder,
                &self.config.sampler,
                Duration::from_secs(self.config.oracle.embedding_timeout_secs),
            );
            sampler.sample(reduced.items).await
        } else {
            let items = balanced_top_items(
                reduced.items,
                self.config.sampler.target_count,
                self.config.sampler.min_engagement,
            );
            Outcome::Trusted(items.into_iter().map(SampledItem::representative).collect())
        };
        let sampler_degraded = sampled.is_degraded();
        let sampled = sampled.into_inner();

        let scorer = SentimentScorer::new(self.llm, &self.config.scorer, &params.keyword, self.llm_timeout());
        let scored = scorer.score(&sampled).await;
        let sentiment_score = weighted_score(&scored.results);

        let clusterer = OpinionClusterer::new(self.llm, &self.config.cluster, self.llm_timeout());
        let clusters = clusterer
            .cluster(&params.keyword, &params.report_language, &scored.results, &sampled)
            .await;
        let clusterer_degraded = clusters.is_degraded();
        let clusters = clusters.into_inner();

        let mindmap = MindmapGenerator::new(self.llm, self.llm_timeout())
            .generate(&params.keyword, &clusters.opinions, sentiment_score)
            .await;
        let mindmap_degraded = mindmap.is_degraded();

        let heat_index = heat.finish(params.expected_count, &params.platforms);

        let diagnostics = Diagnostics {
            kept_items,
            rejected: stats
                .rejected
                .iter()
                .map(|(reason, count)| (reason.as_str().to_string(), *count))
                .collect(),
            sampled_items: sampled.len(),
            sampler_degraded,
            degraded_batches: scored.degraded_batches,
            total_batches: scored.total_batches,
            clusterer_degraded,
            mindmap_degraded,
        };

        tracing::info!(
            keyword = %params.keyword,
            total_items = stats.seen,
            kept_items,
            sampled_items = diagnostics.sampled_items,
            sentiment_score,
            heat_index,
            degraded_batches = diagnostics.degraded_batches,
            clusterer_degraded,
            mindmap_degraded,
            "analysis complete"
        );

        Ok(AnalysisResult {
            sentiment_score,
            key_opinions: clusters.opinions,
            summary: clusters.summary,
            mermaid_code: mindmap.into_inner(),
            heat_index,
            total_items: stats.seen,
            platform_distribution: platform_distribution(&stats.platform_counts),
            analyzed_at: Utc::now(),
            diagnostics,
        })
    }
}

/// Run one analysis with the given oracles.
///
/// # Errors
///
/// See [`Pipeline::run`].
pub async fn run_analysis<I>(
    items: I,
    params: &RunParams,
    config: &AppConfig,
    llm: &dyn TextGenerator,
    embedder: Option<&dyn Embedder>,
) -> Result<AnalysisResult, AnalysisError>
where
    I: IntoIterator<Item = RawItem>,
{
    let mut pipeline = Pipeline::new(config, llm);
    if let Some(embedder) = embedder {
        pipeline = pipeline.with_embedder(embedder);
    }
    pipeline.run(items, params).await
}
