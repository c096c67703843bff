use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TEI embed error: {0}")]
    Tei(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("unreadable input after {seen} item(s): {message}")]
    Input { seen: usize, message: String },

    #[error("no items to analyse")]
    EmptyInput,

    #[error("no valid items after cleaning ({rejected} of {total} rejected)")]
    NoValidItems { total: usize, rejected: usize },

    #[error("background task failed: {0}")]
    Task(String),
}
