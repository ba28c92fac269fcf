//! REST API Error Types
//!
//! Maps domain errors onto HTTP statuses and a JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::TranslateError;

/// Error details in API response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// REST API error that can be returned from handlers
#[derive(Debug)]
pub struct RestError {
    pub status: StatusCode,
    pub error: ApiError,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.error
        }));
        (self.status, body).into_response()
    }
}

impl From<TranslateError> for RestError {
    fn from(err: TranslateError) -> Self {
        let (status, code) = match &err {
            TranslateError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            TranslateError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            TranslateError::SchemaRead { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SCHEMA_READ_FAILED")
            }
            TranslateError::Config { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            TranslateError::Ddl { .. } => (StatusCode::BAD_REQUEST, "DDL_FAILED"),
            // Execution failures are reported per candidate inside /ask
            // responses; one reaching here is a handler bug.
            TranslateError::Execution { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "EXECUTION_FAILED")
            }
            TranslateError::Generation { .. } => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
            TranslateError::ConstraintEngine { .. } => {
                (StatusCode::BAD_GATEWAY, "CONSTRAINT_ENGINE_FAILED")
            }
            TranslateError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        RestError {
            status,
            error: ApiError::new(code, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(err: TranslateError) -> (StatusCode, String) {
        let rest: RestError = err.into();
        (rest.status, rest.error.code)
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            map(TranslateError::NotFound {
                db_id: "x".to_string()
            }),
            (StatusCode::NOT_FOUND, "NOT_FOUND".to_string())
        );
        assert_eq!(
            map(TranslateError::AlreadyExists {
                db_id: "x".to_string()
            }),
            (StatusCode::CONFLICT, "ALREADY_EXISTS".to_string())
        );
        assert_eq!(
            map(TranslateError::Ddl {
                message: "bad".to_string()
            }),
            (StatusCode::BAD_REQUEST, "DDL_FAILED".to_string())
        );
        assert_eq!(
            map(TranslateError::Generation {
                message: "down".to_string()
            }),
            (StatusCode::BAD_GATEWAY, "GENERATION_FAILED".to_string())
        );
        assert_eq!(
            map(TranslateError::ConstraintEngine {
                message: "down".to_string()
            }),
            (StatusCode::BAD_GATEWAY, "CONSTRAINT_ENGINE_FAILED".to_string())
        );
    }

    #[test]
    fn test_message_is_preserved() {
        let err = TranslateError::NotFound {
            db_id: "concert_singer".to_string(),
        };
        let expected = err.to_string();
        let rest: RestError = err.into();
        assert_eq!(rest.error.message, expected);
    }
}
