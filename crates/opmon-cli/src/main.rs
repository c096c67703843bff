mod analyze;
mod input;
mod reduce;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use opmon_core::Platform;
use tracing_subscriber::EnvFilter;

use crate::analyze::{run_analyze, AnalyzeArgs};
use crate::reduce::run_reduce;

#[derive(Debug, Parser)]
#[command(name = "opmon")]
#[command(about = "Social media opinion analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full analysis over collected items
    Analyze {
        /// JSON array or JSON Lines file of raw items
        #[arg(long)]
        input: PathBuf,

        /// Topic keyword the items were collected for
        #[arg(long)]
        keyword: String,

        /// Keep only items in this language (`auto` keeps everything)
        #[arg(long, default_value = "en")]
        language: String,

        /// Language of the generated report (`auto` follows the keyword)
        #[arg(long, default_value = "auto")]
        report_language: String,

        /// Platforms the collection was requested for (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,

        /// Number of items the collectors were asked for
        #[arg(long, default_value_t = 0)]
        expected_count: usize,

        /// Skip embedding-based sampling and keep the most engaging items
        #[arg(long)]
        no_sampling: bool,

        /// Write the JSON result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Clean and rank items without calling any model
    Reduce {
        /// JSON array or JSON Lines file of raw items
        #[arg(long)]
        input: PathBuf,

        /// How many items to keep
        #[arg(long, default_value_t = 200)]
        top_k: usize,

        /// Keep only items in this language (`auto` keeps everything)
        #[arg(long, default_value = "en")]
        language: String,
    },
}

fn init_tracing(fallback_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            keyword,
            language,
            report_language,
            platforms,
            expected_count,
            no_sampling,
            output,
        } => {
            let config = opmon_core::load_app_config_from_env()?;
            init_tracing(&config.log_level)?;
            let args = AnalyzeArgs {
                input,
                keyword,
                language,
                report_language,
                platforms,
                expected_count,
                no_sampling,
                output,
            };
            run_analyze(&config, &args).await?;
        }
        Commands::Reduce {
            input,
            top_k,
            language,
        } => {
            let level = std::env::var("OPMON_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            init_tracing(&level)?;
            if top_k == 0 {
                anyhow::bail!("--top-k must be at least 1");
            }
            run_reduce(&input, top_k, &language)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
