//! Generate, validate, and repair at most once.

use std::time::Duration;

use crate::error::AnalysisError;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts;

/// Why a stage could not obtain a valid model response.
#[derive(Debug)]
pub(crate) enum RepairFailure {
    /// The repair call itself failed or timed out.
    Call(AnalysisError),
    /// The repaired output still did not validate.
    Invalid(String),
}

impl std::fmt::Display for RepairFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call(e) => write!(f, "{e}"),
            Self::Invalid(reason) => write!(f, "invalid after repair: {reason}"),
        }
    }
}

async fn call(
    llm: &dyn TextGenerator,
    request: &GenerationRequest,
    timeout: Duration,
    stage: &'static str,
) -> Result<String, AnalysisError> {
    tokio::time::timeout(timeout, llm.generate(request))
        .await
        .map_err(|_| AnalysisError::Timeout {
            operation: stage,
            secs: timeout.as_secs(),
        })?
}

/// Run `request`, validating the raw text with `validate`.
///
/// On a failed call or a validation error exactly one repair request is sent,
/// carrying the rejected output and the reason. A second failure is returned
/// to the caller, which substitutes its deterministic fallback.
pub(crate) async fn generate_validated<T, V>(
    llm: &dyn TextGenerator,
    request: &GenerationRequest,
    repair_system: &str,
    timeout: Duration,
    stage: &'static str,
    validate: V,
) -> Result<T, RepairFailure>
where
    V: Fn(&str) -> Result<T, String>,
{
    let (raw, reason) = match call(llm, request, timeout, stage).await {
        Ok(raw) => match validate(&raw) {
            Ok(value) => return Ok(value),
            Err(reason) => (raw, reason),
        },
        Err(e) => (String::new(), e.to_string()),
    };

    tracing::debug!(stage, reason = %reason, "model output rejected; requesting repair");

    let repair = GenerationRequest {
        system: repair_system.to_string(),
        user: prompts::repair_user(&raw, &reason),
        temperature: 0.0,
        max_tokens: request.max_tokens,
        json_mode: request.json_mode,
    };

    let repaired = call(llm, &repair, timeout, stage)
        .await
        .map_err(RepairFailure::Call)?;
    validate(&repaired).map_err(RepairFailure::Invalid)
}
