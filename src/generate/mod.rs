//! # Generation Pipeline
//!
//! Everything between a serialized schema and ranked SQL candidates:
//! - the [`SqlGenerator`] capability and its HTTP implementation ([`backend`])
//! - the constraint oracle contract and the constrained wrapper ([`oracle`])
//! - the [`GenerationDispatcher`] orchestrating both request shapes
//!   ([`dispatcher`])
//!
//! Whether generation runs constrained is decided once at startup by
//! [`build_generator`]; per-request code never branches on it.

pub mod backend;
pub mod dispatcher;
pub mod oracle;

use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::error::TranslateResult;

pub use backend::{GenerationParams, RawCandidate, RemoteGenerator, SqlGenerator};
pub use dispatcher::{GenerationDispatcher, GenerationRequest};
pub use oracle::{ConstrainedGenerator, ConstraintOracle, RemoteOracle};

/// One ranked SQL candidate, best first in a result batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCandidate {
    pub sql: String,
    pub score: f64,
}

/// Select the generator variant once at startup: the plain remote
/// backend, or the same backend supervised by the constraint oracle.
pub fn build_generator(config: &GenerationConfig) -> TranslateResult<Arc<dyn SqlGenerator>> {
    let remote = RemoteGenerator::new(config)?;
    if config.oracle.enabled {
        let oracle = RemoteOracle::new(&config.oracle, config.request_timeout_secs)?;
        tracing::info!(endpoint = %config.oracle.endpoint, "constrained generation enabled");
        Ok(Arc::new(ConstrainedGenerator::new(
            remote,
            Arc::new(oracle),
        )))
    } else {
        tracing::info!(endpoint = %config.endpoint, "unconstrained generation");
        Ok(Arc::new(remote))
    }
}
