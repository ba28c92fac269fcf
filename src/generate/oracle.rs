//! Constraint oracle contract and the constrained generation wrapper.
//!
//! The oracle owns incremental SQL parsing and per-step token filtering;
//! this crate owns only the structural contract: the oracle must be
//! reachable and must answer proposals. A breakdown is an error, never a
//! silent fall back to unconstrained output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OracleConfig;
use crate::error::{TranslateError, TranslateResult};
use crate::generate::backend::{GenerationParams, RawCandidate, SqlGenerator};

/// Per-step token filter for constrained decoding.
#[async_trait]
pub trait ConstraintOracle: Send + Sync {
    /// Token continuations the oracle accepts after `prefix`.
    ///
    /// An empty proposal for an empty prefix means the oracle cannot
    /// accept any query at all; callers treat that as breakdown.
    async fn propose_next_token_set(&self, prefix: &[String]) -> TranslateResult<Vec<String>>;
}

#[derive(Serialize)]
struct ProposeRequest<'a> {
    prefix: &'a [String],
}

#[derive(Deserialize)]
struct ProposeResponse {
    tokens: Vec<String>,
}

/// HTTP client for the oracle sidecar.
pub struct RemoteOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteOracle {
    pub fn new(config: &OracleConfig, request_timeout_secs: u64) -> TranslateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| TranslateError::internal(format!("cannot build http client: {e}")))?;
        Ok(RemoteOracle {
            client,
            endpoint: format!("{}/propose", config.endpoint.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ConstraintOracle for RemoteOracle {
    async fn propose_next_token_set(&self, prefix: &[String]) -> TranslateResult<Vec<String>> {
        let oracle_err = |message: String| TranslateError::ConstraintEngine { message };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ProposeRequest { prefix })
            .send()
            .await
            .map_err(|e| oracle_err(format!("oracle unreachable at {}: {e}", self.endpoint)))?
            .error_for_status()
            .map_err(|e| oracle_err(format!("oracle rejected proposal request: {e}")))?;
        let body: ProposeResponse = response
            .json()
            .await
            .map_err(|e| oracle_err(format!("malformed oracle reply: {e}")))?;
        Ok(body.tokens)
    }
}

/// Generator wrapper that runs the backend under the oracle.
///
/// Before dispatch it probes the oracle with an empty prefix; if the
/// oracle is down or proposes nothing, the request fails with a
/// constraint-engine error and the backend is never called. On a live
/// oracle the backend request is flagged `constrained` so the decoder
/// applies the oracle at every step.
pub struct ConstrainedGenerator<G> {
    inner: G,
    oracle: Arc<dyn ConstraintOracle>,
}

impl<G> ConstrainedGenerator<G> {
    pub fn new(inner: G, oracle: Arc<dyn ConstraintOracle>) -> Self {
        ConstrainedGenerator { inner, oracle }
    }
}

#[async_trait]
impl<G: SqlGenerator> SqlGenerator for ConstrainedGenerator<G> {
    async fn generate(
        &self,
        input: &str,
        params: &GenerationParams,
    ) -> TranslateResult<Vec<RawCandidate>> {
        let proposal = self.oracle.propose_next_token_set(&[]).await?;
        if proposal.is_empty() {
            return Err(TranslateError::ConstraintEngine {
                message: "oracle proposed no tokens for the empty prefix".to_string(),
            });
        }
        let constrained = GenerationParams {
            constrained: true,
            ..params.clone()
        };
        self.inner.generate(input, &constrained).await
    }
}
