/// Stream reducer settings.
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// Top-K capacity.
    pub capacity: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub filter_ads: bool,
    pub filter_bots: bool,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            min_length: 10,
            max_length: 5000,
            filter_ads: true,
            filter_bots: true,
        }
    }
}

/// Semantic sampler settings.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub target_count: usize,
    pub k_min: usize,
    pub k_max: usize,
    /// Share of the output budget reserved for outliers, in `[0.0, 0.5]`.
    pub outlier_ratio: f64,
    pub text_max_length: usize,
    /// Texts per embedding request.
    pub batch_size: usize,
    pub seed: u64,
    /// Engagement floor for the per-platform quota when sampling is off.
    pub min_engagement: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            target_count: 50,
            k_min: 3,
            k_max: 10,
            outlier_ratio: 0.1,
            text_max_length: 400,
            batch_size: 64,
            seed: 42,
            min_engagement: 5,
        }
    }
}

/// Sentiment scorer (map phase) settings.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub batch_size: usize,
    /// Per-item character budget inside the prompt.
    pub text_limit: usize,
    pub max_concurrent: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            text_limit: 500,
            max_concurrent: 4,
        }
    }
}

/// Opinion clusterer (reduce phase) settings.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub opinion_count_min: usize,
    pub opinion_count_max: usize,
    /// Sorted, deduplicated item-count breakpoints.
    pub opinion_count_thresholds: Vec<usize>,
    /// Per-excerpt character budget inside the prompt.
    pub text_limit: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            opinion_count_min: 2,
            opinion_count_max: 6,
            opinion_count_thresholds: vec![12, 24, 36, 48],
            text_limit: 200,
        }
    }
}

/// Endpoints and credentials for the embedding and text-generation oracles.
#[derive(Clone)]
pub struct OracleConfig {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    /// TEI base URL. `None` disables embedding calls.
    pub embedding_url: Option<String>,
    pub embedding_timeout_secs: u64,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("llm_api_key", &"[redacted]")
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("embedding_url", &self.embedding_url)
            .field("embedding_timeout_secs", &self.embedding_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub run_timeout_secs: u64,
    pub oracle: OracleConfig,
    pub reducer: ReducerConfig,
    pub sampler: SamplerConfig,
    pub scorer: ScorerConfig,
    pub cluster: ClusterConfig,
}
