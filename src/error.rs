//! Error types for the translation service.
//!
//! One error enum covers the whole pipeline. Per-candidate execution
//! failures are represented as [`TranslateError::Execution`] but are
//! normally captured inline in an execution outcome rather than
//! propagated; everything else aborts the request that raised it.

use thiserror::Error;

/// Service-wide error type.
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    /// No database file exists for the given id.
    #[error("database not found: {db_id}")]
    NotFound { db_id: String },

    /// A create was attempted for a database that already exists.
    #[error("database already exists: {db_id}")]
    AlreadyExists { db_id: String },

    /// Structural introspection of a database file failed.
    #[error("failed to read schema of '{db_id}': {message}")]
    SchemaRead { db_id: String, message: String },

    /// Malformed request or configuration value (unknown serialization
    /// style, invalid database id, zero candidates requested).
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// A DDL batch failed; the whole batch was rolled back.
    #[error("DDL batch failed: {message}")]
    Ddl { message: String },

    /// One generated candidate failed at execution time. Scoped to that
    /// candidate; sibling candidates are unaffected.
    #[error("while executing \"{query}\", the following error occurred: {message}")]
    Execution { query: String, message: String },

    /// The inference backend failed structurally: unreachable, non-success
    /// status, malformed reply, or fewer candidates than requested.
    #[error("generation backend failure: {message}")]
    Generation { message: String },

    /// The constraint oracle failed structurally (unreachable, crashed
    /// mid-request, protocol breach). Distinct from a candidate merely
    /// being low quality.
    #[error("constraint engine failure: {message}")]
    ConstraintEngine { message: String },

    /// Process-level fault (blocking task panicked, I/O outside any of
    /// the categories above).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl TranslateError {
    /// Shorthand used by blocking-task wrappers.
    pub fn internal(message: impl Into<String>) -> Self {
        TranslateError::Internal {
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for TranslateError {
    fn from(e: tokio::task::JoinError) -> Self {
        TranslateError::Internal {
            message: format!("blocking task failed: {e}"),
        }
    }
}

/// Result type for translation operations.
pub type TranslateResult<T> = Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_message_names_the_query() {
        let e = TranslateError::Execution {
            query: "SELECT * FROM missing".to_string(),
            message: "no such table: missing".to_string(),
        };
        let text = e.to_string();
        assert!(text.contains("SELECT * FROM missing"));
        assert!(text.contains("no such table"));
    }

    #[test]
    fn test_not_found_message() {
        let e = TranslateError::NotFound {
            db_id: "concert_singer".to_string(),
        };
        assert_eq!(e.to_string(), "database not found: concert_singer");
    }
}
