//! # nl2sql Translation Server
//!
//! Schema-aware natural-language-to-SQL serving backend: questions come
//! in over HTTP, schemas of the target SQLite databases are serialized
//! into the generator input, candidate SQL comes back from a seq2seq
//! inference backend, and candidates are executed against the catalog.
//!
//! ## Request Pipeline
//! ```text
//! GET /ask?db_id=...&question=...
//!     ↓
//! [SchemaStore]         → cached Schema (single-flight introspection)
//!     ↓
//! [SchemaSerializer]    → schema text in the configured style
//!     ↓
//! [GenerationDispatcher]→ prefix + question + schema → backend → ranked SQL
//!     ↓
//! [QueryExecutor]       → per-candidate rows or inline error
//!     ↓
//! JSON response, one entry per candidate
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `config` | Layered configuration (file + env) |
//! | `error` | Domain error type shared across layers |
//! | `schema` | Introspection, caching, serialization, DDL admin |
//! | `generate` | Backend client, constrained wrapper, dispatch |
//! | `execute` | Candidate execution against SQLite |
//! | `handler` | Shared server state, one method per operation |
//! | `rest` | Axum HTTP surface |

pub mod config;
pub mod error;
pub mod execute;
pub mod generate;
pub mod handler;
pub mod rest;
pub mod schema;

// Re-export the types most callers need
pub use config::{Config, SerializationConfig, SerializationStyle};
pub use error::{TranslateError, TranslateResult};
pub use handler::Handler;
pub use schema::{Schema, SchemaSerializer, SchemaStore};
