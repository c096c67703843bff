//! `analyze` command: run the full pipeline over an input file.

use std::path::PathBuf;
use std::time::Duration;

use opmon_analysis::{ChatClient, Pipeline, TeiClient};
use opmon_core::{AppConfig, Platform, RunParams};

use crate::input::open_items;

/// Arguments of `opmon analyze`, already parsed by clap.
#[derive(Debug)]
pub(crate) struct AnalyzeArgs {
    pub input: PathBuf,
    pub keyword: String,
    pub language: String,
    pub report_language: String,
    pub platforms: Vec<Platform>,
    pub expected_count: usize,
    pub no_sampling: bool,
    pub output: Option<PathBuf>,
}

impl AnalyzeArgs {
    pub(crate) fn run_params(&self) -> RunParams {
        RunParams {
            keyword: self.keyword.trim().to_string(),
            target_language: self.language.clone(),
            report_language: self.report_language.clone(),
            platforms: self.platforms.clone(),
            expected_count: self.expected_count,
            semantic_sampling: !self.no_sampling,
        }
    }
}

/// Run the pipeline and write the result as pretty JSON.
///
/// # Errors
///
/// Returns an error if the input cannot be read, an oracle client cannot be
/// built, the pipeline rejects the input, or the run exceeds
/// `run_timeout_secs`.
pub(crate) async fn run_analyze(config: &AppConfig, args: &AnalyzeArgs) -> anyhow::Result<()> {
    if args.keyword.trim().is_empty() {
        anyhow::bail!("--keyword must not be empty");
    }
    let items = open_items(&args.input)?;
    let params = args.run_params();

    let llm = ChatClient::new(
        &config.oracle.llm_api_key,
        &config.oracle.llm_base_url,
        &config.oracle.llm_model,
        config.oracle.llm_timeout_secs,
    )?;
    let tei = config
        .oracle
        .embedding_url
        .as_deref()
        .map(|url| {
            TeiClient::new(
                url,
                config.oracle.embedding_timeout_secs,
                config.sampler.batch_size,
            )
        })
        .transpose()?;
    if tei.is_none() && params.semantic_sampling {
        tracing::warn!("OPMON_EMBEDDING_URL is not set; sampling will keep the most engaging items");
    }

    let mut pipeline = Pipeline::new(config, &llm);
    if let Some(tei) = &tei {
        pipeline = pipeline.with_embedder(tei);
    }

    let deadline = Duration::from_secs(config.run_timeout_secs);
    let result = tokio::time::timeout(deadline, pipeline.run_stream(items, &params))
        .await
        .map_err(|_| anyhow::anyhow!("analysis exceeded {}s run timeout", config.run_timeout_secs))??;

    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
            println!(
                "analysis written to {} (sentiment {}, heat {:.2}, {} opinions)",
                path.display(),
                result.sentiment_score,
                result.heat_index,
                result.key_opinions.len()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
