//! Core request handling shared by every REST endpoint.
//!
//! `Handler` owns the schema store, the generation dispatcher, the DDL
//! admin and the query executor, and exposes one method per operation.
//! Counters use `AtomicU64` (lock-free statistics).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::TranslateResult;
use crate::execute::{ExecutionOutcome, QueryExecutor};
use crate::generate::{build_generator, GenerationDispatcher, GenerationRequest, SqlGenerator};
use crate::schema::serialize::generator_input;
use crate::schema::{
    Schema, SchemaAdmin, SchemaSerializer, SchemaStore, SerializationOverrides,
};

/// Placeholder question for schema previews; sampling ranks values that
/// occur in the question, so the preview uses a fixed neutral word.
const PREVIEW_QUESTION: &str = "question";

/// Shared server state behind `Arc`, one instance per process.
pub struct Handler {
    config: Config,
    store: Arc<SchemaStore>,
    serializer: SchemaSerializer,
    dispatcher: GenerationDispatcher,
    admin: SchemaAdmin,
    executor: QueryExecutor,
    start_time: Instant,
    questions_asked: AtomicU64,
}

impl Handler {
    /// Create a handler from configuration, building the generation
    /// backend (and the constrained wrapper when the oracle is enabled).
    pub fn from_config(config: Config) -> TranslateResult<Self> {
        let generator = build_generator(&config.generation)?;
        Ok(Self::with_generator(config, generator))
    }

    /// Create a handler around an explicit generator. Test seam; also
    /// the tail of [`Handler::from_config`].
    pub fn with_generator(config: Config, generator: Arc<dyn SqlGenerator>) -> Self {
        let store = Arc::new(SchemaStore::new(&config.storage.db_root));
        let serializer = SchemaSerializer::new(config.serialization.clone());
        let dispatcher = GenerationDispatcher::new(
            Arc::clone(&store),
            serializer.clone(),
            generator,
            config.generation.clone(),
        );
        let admin = SchemaAdmin::new(Arc::clone(&store));
        Self {
            config,
            store,
            serializer,
            dispatcher,
            admin,
            executor: QueryExecutor,
            start_time: Instant::now(),
            questions_asked: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get total questions answered (both ask variants).
    pub fn total_questions(&self) -> u64 {
        self.questions_asked.load(Ordering::Relaxed)
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// List catalog databases; empty when the root directory is missing.
    pub fn list_databases(&self) -> TranslateResult<Vec<String>> {
        self.store.list_databases()
    }

    /// Resolve the schema of `db_id` (cached after the first call).
    pub async fn schema(&self, db_id: &str) -> TranslateResult<Arc<Schema>> {
        self.store.resolve(db_id).await
    }

    /// Create a database from a DDL batch and return its schema.
    pub async fn create_database(
        &self,
        db_id: &str,
        statements: Vec<String>,
    ) -> TranslateResult<Arc<Schema>> {
        self.admin.create(db_id, statements).await
    }

    /// Apply a DDL batch to an existing database and return the rebuilt
    /// schema.
    pub async fn update_database(
        &self,
        db_id: &str,
        statements: Vec<String>,
    ) -> TranslateResult<Arc<Schema>> {
        self.admin.update(db_id, statements).await
    }

    /// Translate `question` against `db_id` and run every candidate.
    ///
    /// Candidates are executed in rank order; a failing candidate yields
    /// an error outcome without aborting its siblings.
    pub async fn ask(
        &self,
        db_id: &str,
        question: &str,
    ) -> TranslateResult<Vec<ExecutionOutcome>> {
        self.questions_asked.fetch_add(1, Ordering::Relaxed);
        let candidates = self
            .dispatcher
            .generate(
                GenerationRequest::ById {
                    utterance: question.to_string(),
                    db_id: db_id.to_string(),
                },
                self.config.generation.num_return_sequences,
            )
            .await?;
        let queries = candidates.into_iter().map(|c| c.sql).collect();
        self.executor
            .execute(self.store.db_file_path(db_id), queries)
            .await
    }

    /// Translate `question` against caller-provided schema text. No
    /// catalog lookup and no execution; returns the ranked SQL strings.
    pub async fn ask_with_schema(
        &self,
        question: &str,
        db_schema: &str,
    ) -> TranslateResult<Vec<String>> {
        self.questions_asked.fetch_add(1, Ordering::Relaxed);
        let candidates = self
            .dispatcher
            .generate(
                GenerationRequest::Inline {
                    utterance: question.to_string(),
                    schema_text: db_schema.to_string(),
                },
                self.config.generation.num_return_sequences,
            )
            .await?;
        Ok(candidates.into_iter().map(|c| c.sql).collect())
    }

    /// Render the generator input `db_id` would produce for a placeholder
    /// question, with `overrides` merged over the configured defaults.
    pub async fn serialized_schema(
        &self,
        db_id: &str,
        overrides: &SerializationOverrides,
    ) -> TranslateResult<String> {
        let schema = self.store.resolve(db_id).await?;
        let db_file = self.store.db_file_path(db_id);
        let serializer = SchemaSerializer::new(overrides.apply(self.serializer.config()));
        let serialized = tokio::task::spawn_blocking(move || {
            serializer.serialize(&schema, PREVIEW_QUESTION, &db_file)
        })
        .await??;
        Ok(generator_input(PREVIEW_QUESTION, &serialized, ""))
    }
}
