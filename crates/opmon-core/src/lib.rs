//! Shared domain types and configuration for the opinion-monitor workspace.

pub mod app_config;
pub mod config;
pub mod items;
pub mod params;

pub use app_config::{
    AppConfig, ClusterConfig, OracleConfig, ReducerConfig, SamplerConfig, ScorerConfig,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use items::{ContentType, Platform, RawItem};
pub use params::RunParams;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
