//! HTTP client for the inference sidecar.
//!
//! The sidecar holds the actual sequence-to-sequence model; this crate
//! only ships text in and candidate texts out. Transport trouble, error
//! statuses, and malformed replies all surface as
//! [`TranslateError::Generation`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::{TranslateError, TranslateResult};

/// Decode-time knobs forwarded to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationParams {
    pub num_return_sequences: usize,
    pub num_beams: usize,
    pub max_length: usize,
    /// Set by the constrained wrapper; the backend must run its decoder
    /// under the oracle when this is on.
    pub constrained: bool,
}

/// Raw backend output, one entry per returned sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub text: String,
    pub score: f64,
}

/// A sequence generator producing `num_return_sequences` texts per
/// input. Implementations must be cancellation-safe: dropping the
/// future abandons the request without side effects.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(
        &self,
        input: &str,
        params: &GenerationParams,
    ) -> TranslateResult<Vec<RawCandidate>>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    input: &'a str,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Deserialize)]
struct GenerateResponse {
    outputs: Vec<GeneratedSequence>,
}

#[derive(Deserialize)]
struct GeneratedSequence {
    text: String,
    #[serde(default)]
    score: f64,
}

/// Unconstrained production generator: POSTs to the inference service.
pub struct RemoteGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteGenerator {
    pub fn new(config: &GenerationConfig) -> TranslateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TranslateError::internal(format!("cannot build http client: {e}")))?;
        Ok(RemoteGenerator {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl SqlGenerator for RemoteGenerator {
    async fn generate(
        &self,
        input: &str,
        params: &GenerationParams,
    ) -> TranslateResult<Vec<RawCandidate>> {
        let backend_err = |message: String| TranslateError::Generation { message };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { input, params })
            .send()
            .await
            .map_err(|e| backend_err(format!("request to {} failed: {e}", self.endpoint)))?
            .error_for_status()
            .map_err(|e| backend_err(format!("backend rejected request: {e}")))?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| backend_err(format!("malformed backend reply: {e}")))?;
        Ok(body
            .outputs
            .into_iter()
            .map(|s| RawCandidate {
                text: s.text,
                score: s.score,
            })
            .collect())
    }
}
