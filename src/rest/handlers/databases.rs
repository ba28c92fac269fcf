//! Database Listing and Health Handlers

use std::sync::Arc;

use axum::{Extension, Json};

use crate::handler::Handler;
use crate::rest::dto::HealthDto;
use crate::rest::error::RestError;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "admin",
    responses(
        (status = 200, description = "Server is healthy", body = HealthDto),
    )
)]
pub async fn health(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<HealthDto>, RestError> {
    // The probe stays green even when the database root is unreadable;
    // the count just drops to zero.
    let databases = handler.list_databases().map(|d| d.len()).unwrap_or(0);
    let health = HealthDto {
        status: "healthy".to_string(),
        version: handler.version().to_string(),
        uptime_secs: handler.uptime_seconds(),
        databases,
    };
    Ok(Json(health))
}

/// List all databases under the configured root
#[utoipa::path(
    get,
    path = "/database",
    tag = "databases",
    responses(
        (status = 200, description = "Sorted database ids", body = Vec<String>),
        (status = 500, description = "Database root unreadable"),
    )
)]
pub async fn list_databases(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<Vec<String>>, RestError> {
    Ok(Json(handler.list_databases()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn make_handler(dir: &tempfile::TempDir) -> Arc<Handler> {
        let mut config = Config::default();
        config.storage.db_root = dir.path().to_path_buf();
        Arc::new(Handler::from_config(config).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_database_count() {
        let dir = tempfile::tempdir().unwrap();
        let handler = make_handler(&dir);
        handler
            .create_database("a", vec!["CREATE TABLE t (x)".to_string()])
            .await
            .unwrap();

        let result = health(Extension(handler)).await.unwrap();
        assert_eq!(result.0.status, "healthy");
        assert_eq!(result.0.databases, 1);
        assert!(!result.0.version.is_empty());
    }

    #[tokio::test]
    async fn test_list_databases_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let handler = make_handler(&dir);
        for id in ["beta", "alpha"] {
            handler
                .create_database(id, vec!["CREATE TABLE t (x)".to_string()])
                .await
                .unwrap();
        }

        let result = list_databases(Extension(handler)).await.unwrap();
        assert_eq!(result.0, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn test_list_databases_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let handler = make_handler(&dir);
        let result = list_databases(Extension(handler)).await.unwrap();
        assert!(result.0.is_empty());
    }
}
