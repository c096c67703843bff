use crate::items::Platform;

/// Per-run parameters supplied by the caller alongside the item stream.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub keyword: String,
    /// Language items must be written in (`en`, `zh`, ...). `auto` disables
    /// the language check.
    pub target_language: String,
    /// Language the report text should be written in. `auto` matches the
    /// keyword language.
    pub report_language: String,
    /// Platforms the run was requested for; used for heat-index coverage.
    pub platforms: Vec<Platform>,
    /// Number of items the collectors were asked for; used for heat-index
    /// volume. `0` means no expectation.
    pub expected_count: usize,
    pub semantic_sampling: bool,
}

impl RunParams {
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            target_language: "en".to_string(),
            report_language: "auto".to_string(),
            platforms: Vec::new(),
            expected_count: 0,
            semantic_sampling: true,
        }
    }
}
