//! Embedding oracle: the [`Embedder`] seam and a TEI (Text Embeddings
//! Inference) HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AnalysisError;

/// Maps texts to fixed-dimension vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AnalysisError>;
}

/// TEI HTTP client.
pub struct TeiClient {
    client: reqwest::Client,
    url: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    normalize: bool,
}

impl TeiClient {
    /// Create a new `TeiClient` posting to `{tei_url}/embed`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(tei_url: &str, timeout_secs: u64, batch_size: usize) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/embed", tei_url.trim_end_matches('/')),
            batch_size: batch_size.max(1),
        })
    }

    async fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, AnalysisError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest {
                inputs: chunk,
                normalize: true,
            })
            .send()
            .await
            .map_err(|e| AnalysisError::Tei(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Tei(format!("embed endpoint answered {status}")));
        }

        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| AnalysisError::Tei(format!("unreadable embed response: {e}")))?;
        if vectors.len() == chunk.len() {
            Ok(vectors)
        } else {
            Err(AnalysisError::Tei(format!(
                "{} vectors for {} inputs",
                vectors.len(),
                chunk.len()
            )))
        }
    }
}

#[async_trait]
impl Embedder for TeiClient {
    /// Texts are sent in chunks of `batch_size` per request; the first failing
    /// chunk aborts the call.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Tei`] if a request fails, the response cannot
    /// be parsed, or the server returns the wrong number of vectors.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AnalysisError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (chunk_no, chunk) in texts.chunks(self.batch_size).enumerate() {
            vectors.extend(self.embed_chunk(chunk).await?);
            tracing::trace!(chunk = chunk_no, size = chunk.len(), "embedded chunk");
        }
        tracing::debug!(count = vectors.len(), "embeddings generated");
        Ok(vectors)
    }
}
