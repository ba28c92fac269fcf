//! Request orchestration: schema resolution, input assembly, backend
//! dispatch, and post-processing into ranked SQL.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::error::{TranslateError, TranslateResult};
use crate::generate::backend::{GenerationParams, SqlGenerator};
use crate::generate::SqlCandidate;
use crate::schema::serialize::generator_input;
use crate::schema::{SchemaSerializer, SchemaStore};

/// The two request shapes: translate against a catalog database, or
/// against caller-provided schema text (already serialized).
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    ById { utterance: String, db_id: String },
    Inline { utterance: String, schema_text: String },
}

/// Drives one generation call end to end.
pub struct GenerationDispatcher {
    store: Arc<SchemaStore>,
    serializer: SchemaSerializer,
    generator: Arc<dyn SqlGenerator>,
    config: GenerationConfig,
}

impl GenerationDispatcher {
    pub fn new(
        store: Arc<SchemaStore>,
        serializer: SchemaSerializer,
        generator: Arc<dyn SqlGenerator>,
        config: GenerationConfig,
    ) -> Self {
        GenerationDispatcher {
            store,
            serializer,
            generator,
            config,
        }
    }

    /// Produce `num_return_sequences` ranked SQL candidates, best first.
    ///
    /// `NotFound` propagates from schema resolution before the backend is
    /// touched. Async end to end: dropping the returned future cancels
    /// the in-flight backend call and no partial candidates escape.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        num_return_sequences: usize,
    ) -> TranslateResult<Vec<SqlCandidate>> {
        if num_return_sequences == 0 {
            return Err(TranslateError::Config {
                message: "num_return_sequences must be at least 1".to_string(),
            });
        }
        if num_return_sequences > self.config.num_beams {
            return Err(TranslateError::Config {
                message: format!(
                    "num_return_sequences ({num_return_sequences}) cannot exceed num_beams ({})",
                    self.config.num_beams
                ),
            });
        }

        let (utterance, serialized) = match request {
            GenerationRequest::ById { utterance, db_id } => {
                let schema = self.store.resolve(&db_id).await?;
                let db_file = self.store.db_file_path(&db_id);
                let serializer = self.serializer.clone();
                let question = utterance.clone();
                let serialized = tokio::task::spawn_blocking(move || {
                    serializer.serialize(&schema, &question, &db_file)
                })
                .await??;
                (utterance, serialized)
            }
            GenerationRequest::Inline {
                utterance,
                schema_text,
            } => (utterance, schema_text),
        };

        let input = generator_input(&utterance, &serialized, &self.config.source_prefix);
        let params = GenerationParams {
            num_return_sequences,
            num_beams: self.config.num_beams,
            max_length: self.config.max_length,
            constrained: false,
        };
        tracing::debug!(
            input_len = input.len(),
            num_return_sequences,
            "dispatching generation"
        );

        let raw = self.generator.generate(&input, &params).await?;
        if raw.len() < num_return_sequences {
            return Err(TranslateError::Generation {
                message: format!(
                    "backend returned {} candidates, expected {num_return_sequences}",
                    raw.len()
                ),
            });
        }

        let mut candidates: Vec<SqlCandidate> = raw
            .into_iter()
            .map(|c| SqlCandidate {
                sql: self.postprocess(&c.text),
                score: c.score,
            })
            .collect();
        // Stable sort: equal scores keep generation order.
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(num_return_sequences);
        Ok(candidates)
    }

    fn postprocess(&self, text: &str) -> String {
        let sql = strip_db_id_prefix(text);
        if self.config.normalize {
            normalize_sql(sql)
        } else {
            sql.to_string()
        }
    }
}

/// Generators echo the serialized input's `db_id |` frame back in front
/// of the SQL; everything up to the first pipe is that echo.
fn strip_db_id_prefix(text: &str) -> &str {
    match text.split_once('|') {
        Some((_, rest)) => rest.trim(),
        None => text.trim(),
    }
}

/// Lowercase everything outside quoted literals, collapse whitespace
/// runs, and re-attach commas to the token before them.
fn normalize_sql(sql: &str) -> String {
    let mut lowered = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                lowered.push(c);
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    lowered.push(c);
                } else {
                    lowered.extend(c.to_lowercase());
                }
            }
        }
    }
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(" , ", ", ")
}
