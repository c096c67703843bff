//! Opinion analysis pipeline for opmon.
//!
//! Reduces a raw social-media item stream to its most engaging items,
//! samples them for diversity via TEI embeddings, scores sentiment through an
//! OpenAI-compatible LLM in batches, then clusters opinions and renders a
//! Mermaid mindmap. Model output is never trusted: each call is validated,
//! repaired at most once, and otherwise replaced by a deterministic fallback.

pub mod aggregate;
pub mod clusterer;
pub mod embeddings;
pub mod error;
pub mod filter;
pub mod heat;
pub mod llm;
pub mod mindmap;
pub mod pipeline;
pub mod prompts;
pub mod reducer;
pub mod sampler;
pub mod scorer;
pub mod types;

mod kmeans;
mod repair;
mod text;

pub use embeddings::{Embedder, TeiClient};
pub use error::AnalysisError;
pub use filter::{ContentFilter, LanguageDetector, PatternSet, RejectReason, WhatlangDetector};
pub use heat::HeatAccumulator;
pub use llm::{ChatClient, GenerationRequest, TextGenerator};
pub use pipeline::{run_analysis, Pipeline};
pub use reducer::{reduce, Reduced, ReducerStats, StreamReducer};
pub use types::{
    AnalysisResult, Diagnostics, Opinion, Outcome, SampledItem, SentimentDistribution,
    SentimentResult,
};
