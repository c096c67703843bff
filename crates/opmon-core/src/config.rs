use std::env::VarError;
use std::fmt::Display;
use std::str::FromStr;

use crate::app_config::{
    AppConfig, ClusterConfig, OracleConfig, ReducerConfig, SamplerConfig, ScorerConfig,
};
use crate::ConfigError;

/// Largest opinion count the report layout supports.
const OPINION_COUNT_CEILING: usize = 6;

/// Read the `OPMON_*` variables, loading a `.env` file first if present.
///
/// # Errors
///
/// Returns [`ConfigError`] when the API key is missing or a value fails to
/// parse or validate.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Read the `OPMON_*` variables from the process environment only.
///
/// # Errors
///
/// Same as [`load_app_config`].
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn parse_var<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool<F>(lookup: &F, var: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let Ok(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// Parse a comma-separated threshold list.
///
/// Non-numeric and zero entries are skipped; the result is sorted and deduplicated.
#[must_use]
pub fn parse_thresholds(raw: &str) -> Vec<usize> {
    let mut values: Vec<usize> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .collect();
    values.sort_unstable();
    values.dedup();
    values
}

fn invalid(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.into(),
    }
}

/// Assemble and validate an [`AppConfig`] from an arbitrary variable lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let oracle = OracleConfig {
        llm_api_key: require("OPMON_LLM_API_KEY")?,
        llm_base_url: or_default("OPMON_LLM_BASE_URL", "https://api.openai.com/v1"),
        llm_model: or_default("OPMON_LLM_MODEL", "gpt-4o-mini"),
        llm_timeout_secs: parse_var(&lookup, "OPMON_LLM_TIMEOUT_SECS", "60")?,
        embedding_url: lookup("OPMON_EMBEDDING_URL")
            .ok()
            .filter(|v| !v.trim().is_empty()),
        embedding_timeout_secs: parse_var(&lookup, "OPMON_EMBEDDING_TIMEOUT_SECS", "30")?,
    };

    let reducer = ReducerConfig {
        capacity: parse_var(&lookup, "OPMON_TOP_K", "200")?,
        min_length: parse_var(&lookup, "OPMON_MIN_TEXT_LENGTH", "10")?,
        max_length: parse_var(&lookup, "OPMON_MAX_TEXT_LENGTH", "5000")?,
        filter_ads: parse_bool(&lookup, "OPMON_FILTER_ADS", true)?,
        filter_bots: parse_bool(&lookup, "OPMON_FILTER_BOTS", true)?,
    };
    if reducer.capacity == 0 {
        return Err(invalid("OPMON_TOP_K", "must be at least 1"));
    }
    if reducer.min_length > reducer.max_length {
        return Err(invalid(
            "OPMON_MIN_TEXT_LENGTH",
            "must not exceed OPMON_MAX_TEXT_LENGTH",
        ));
    }

    let sampler = SamplerConfig {
        target_count: parse_var(&lookup, "OPMON_SAMPLER_TARGET_COUNT", "50")?,
        k_min: parse_var(&lookup, "OPMON_SAMPLER_K_MIN", "3")?,
        k_max: parse_var(&lookup, "OPMON_SAMPLER_K_MAX", "10")?,
        outlier_ratio: parse_var(&lookup, "OPMON_SAMPLER_OUTLIER_RATIO", "0.1")?,
        text_max_length: parse_var(&lookup, "OPMON_SAMPLER_TEXT_MAX_LENGTH", "400")?,
        batch_size: parse_var(&lookup, "OPMON_SAMPLER_BATCH_SIZE", "64")?,
        seed: parse_var(&lookup, "OPMON_SAMPLER_SEED", "42")?,
        min_engagement: parse_var(&lookup, "OPMON_SAMPLER_MIN_ENGAGEMENT", "5")?,
    };
    if sampler.target_count == 0 {
        return Err(invalid("OPMON_SAMPLER_TARGET_COUNT", "must be at least 1"));
    }
    if sampler.k_min == 0 || sampler.k_min > sampler.k_max {
        return Err(invalid(
            "OPMON_SAMPLER_K_MIN",
            "must be at least 1 and not exceed OPMON_SAMPLER_K_MAX",
        ));
    }
    if !(0.0..=0.5).contains(&sampler.outlier_ratio) {
        return Err(invalid("OPMON_SAMPLER_OUTLIER_RATIO", "must be within [0, 0.5]"));
    }
    if sampler.batch_size == 0 {
        return Err(invalid("OPMON_SAMPLER_BATCH_SIZE", "must be at least 1"));
    }

    let scorer = ScorerConfig {
        batch_size: parse_var(&lookup, "OPMON_SCORER_BATCH_SIZE", "10")?,
        text_limit: parse_var(&lookup, "OPMON_SCORER_TEXT_LIMIT", "500")?,
        max_concurrent: parse_var(&lookup, "OPMON_SCORER_MAX_CONCURRENT", "4")?,
    };
    if scorer.batch_size == 0 {
        return Err(invalid("OPMON_SCORER_BATCH_SIZE", "must be at least 1"));
    }

    let cluster = ClusterConfig {
        opinion_count_min: parse_var(&lookup, "OPMON_OPINION_COUNT_MIN", "2")?,
        opinion_count_max: parse_var(&lookup, "OPMON_OPINION_COUNT_MAX", "6")?,
        opinion_count_thresholds: parse_thresholds(&or_default(
            "OPMON_OPINION_COUNT_THRESHOLDS",
            "12,24,36,48",
        )),
        text_limit: parse_var(&lookup, "OPMON_CLUSTERING_TEXT_LIMIT", "200")?,
    };
    if cluster.opinion_count_min < 2 || cluster.opinion_count_min > cluster.opinion_count_max {
        return Err(invalid(
            "OPMON_OPINION_COUNT_MIN",
            "must be at least 2 and not exceed OPMON_OPINION_COUNT_MAX",
        ));
    }
    if cluster.opinion_count_max > OPINION_COUNT_CEILING {
        return Err(invalid(
            "OPMON_OPINION_COUNT_MAX",
            format!("must not exceed {OPINION_COUNT_CEILING}"),
        ));
    }

    Ok(AppConfig {
        log_level: or_default("OPMON_LOG_LEVEL", "info"),
        run_timeout_secs: parse_var(&lookup, "OPMON_RUN_TIMEOUT_SECS", "600")?,
        oracle,
        reducer,
        sampler,
        scorer,
        cluster,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
