//! Translation Handlers
//!
//! The two ask variants: catalog-backed with execution, and inline
//! schema without execution.

use std::sync::Arc;

use axum::{extract::Query, Extension, Json};

use crate::handler::Handler;
use crate::rest::dto::{AskEntryDto, AskParams, AskWithSchemaRequest};
use crate::rest::error::RestError;

/// Translate a question against a catalog database and run every
/// candidate query
#[utoipa::path(
    get,
    path = "/ask",
    tag = "translation",
    params(AskParams),
    responses(
        (status = 200, description = "Candidates in rank order, execution outcome inline", body = Vec<AskEntryDto>),
        (status = 404, description = "Database not found"),
        (status = 502, description = "Generation backend failure"),
    )
)]
pub async fn ask(
    Extension(handler): Extension<Arc<Handler>>,
    Query(params): Query<AskParams>,
) -> Result<Json<Vec<AskEntryDto>>, RestError> {
    let outcomes = handler.ask(&params.db_id, &params.question).await?;
    Ok(Json(outcomes.into_iter().map(AskEntryDto::from).collect()))
}

/// Translate a question against caller-provided schema text
#[utoipa::path(
    post,
    path = "/ask-with-schema",
    tag = "translation",
    request_body = AskWithSchemaRequest,
    responses(
        (status = 200, description = "Candidate SQL strings in rank order", body = Vec<String>),
        (status = 502, description = "Generation backend failure"),
    )
)]
pub async fn ask_with_schema(
    Extension(handler): Extension<Arc<Handler>>,
    Json(request): Json<AskWithSchemaRequest>,
) -> Result<Json<Vec<String>>, RestError> {
    let sqls = handler
        .ask_with_schema(&request.question, &request.db_schema)
        .await?;
    Ok(Json(sqls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use crate::config::Config;
    use crate::error::{TranslateError, TranslateResult};
    use crate::generate::{GenerationParams, RawCandidate, SqlGenerator};

    struct FixedGenerator {
        outputs: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl SqlGenerator for FixedGenerator {
        async fn generate(
            &self,
            _input: &str,
            _params: &GenerationParams,
        ) -> TranslateResult<Vec<RawCandidate>> {
            Ok(self
                .outputs
                .iter()
                .map(|text| RawCandidate {
                    text: (*text).to_string(),
                    score: 0.0,
                })
                .collect())
        }
    }

    struct DeadGenerator;

    #[async_trait::async_trait]
    impl SqlGenerator for DeadGenerator {
        async fn generate(
            &self,
            _input: &str,
            _params: &GenerationParams,
        ) -> TranslateResult<Vec<RawCandidate>> {
            Err(TranslateError::Generation {
                message: "connection refused".to_string(),
            })
        }
    }

    fn make_handler(
        dir: &tempfile::TempDir,
        generator: Arc<dyn SqlGenerator>,
    ) -> Arc<Handler> {
        let mut config = Config::default();
        config.storage.db_root = dir.path().to_path_buf();
        config.generation.num_return_sequences = 1;
        Arc::new(Handler::with_generator(config, generator))
    }

    async fn seed(handler: &Handler) {
        handler
            .create_database(
                "demo",
                vec![
                    "CREATE TABLE t (id INTEGER, name TEXT)".to_string(),
                    "INSERT INTO t VALUES (1, 'a')".to_string(),
                ],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ask_returns_entries_with_rows() {
        let dir = tempfile::tempdir().unwrap();
        let handler = make_handler(
            &dir,
            Arc::new(FixedGenerator {
                outputs: vec!["demo | SELECT name FROM t"],
            }),
        );
        seed(&handler).await;

        let params = AskParams {
            db_id: "demo".to_string(),
            question: "what names?".to_string(),
        };
        let result = ask(Extension(handler), Query(params)).await.unwrap();
        assert_eq!(result.0.len(), 1);
        assert_eq!(result.0[0].query, "select name from t");
        assert_eq!(
            result.0[0].execution_results,
            Some(vec![vec![serde_json::json!("a")]])
        );
        assert!(result.0[0].error.is_none());
    }

    #[tokio::test]
    async fn test_ask_dead_backend_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let handler = make_handler(&dir, Arc::new(DeadGenerator));
        seed(&handler).await;

        let params = AskParams {
            db_id: "demo".to_string(),
            question: "anything".to_string(),
        };
        let err = ask(Extension(handler), Query(params)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.error.code, "GENERATION_FAILED");
    }

    #[tokio::test]
    async fn test_ask_with_schema_returns_sql_strings() {
        let dir = tempfile::tempdir().unwrap();
        let handler = make_handler(
            &dir,
            Arc::new(FixedGenerator {
                outputs: vec!["SELECT count(*) FROM t"],
            }),
        );

        let request = AskWithSchemaRequest {
            question: "how many?".to_string(),
            db_schema: " | db | t : a".to_string(),
        };
        let result = ask_with_schema(Extension(handler), Json(request))
            .await
            .unwrap();
        assert_eq!(result.0, vec!["select count(*) from t".to_string()]);
    }
}
