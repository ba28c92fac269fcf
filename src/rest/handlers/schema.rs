//! Schema Handlers
//!
//! Introspection, DDL-based create/update, and serialized previews.

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};

use crate::handler::Handler;
use crate::rest::dto::{SchemaDto, SerializedSchemaParams};
use crate::rest::error::RestError;

/// Get the introspected schema of a database
#[utoipa::path(
    get,
    path = "/schema/{db_id}",
    tag = "schema",
    params(
        ("db_id" = String, Path, description = "Database id")
    ),
    responses(
        (status = 200, description = "Schema of the database", body = SchemaDto),
        (status = 404, description = "Database not found"),
        (status = 500, description = "Introspection failed"),
    )
)]
pub async fn get_schema(
    Extension(handler): Extension<Arc<Handler>>,
    Path(db_id): Path<String>,
) -> Result<Json<SchemaDto>, RestError> {
    let schema = handler.schema(&db_id).await?;
    Ok(Json(SchemaDto::from(schema.as_ref())))
}

/// Create a database from a DDL statement batch
#[utoipa::path(
    post,
    path = "/schema/{db_id}",
    tag = "schema",
    params(
        ("db_id" = String, Path, description = "Database id")
    ),
    request_body = Vec<String>,
    responses(
        (status = 200, description = "Schema of the new database", body = SchemaDto),
        (status = 400, description = "DDL batch failed"),
        (status = 409, description = "Database already exists"),
    )
)]
pub async fn create_schema(
    Extension(handler): Extension<Arc<Handler>>,
    Path(db_id): Path<String>,
    Json(statements): Json<Vec<String>>,
) -> Result<Json<SchemaDto>, RestError> {
    let schema = handler.create_database(&db_id, statements).await?;
    Ok(Json(SchemaDto::from(schema.as_ref())))
}

/// Apply a DDL statement batch to an existing database
#[utoipa::path(
    patch,
    path = "/schema/{db_id}",
    tag = "schema",
    params(
        ("db_id" = String, Path, description = "Database id")
    ),
    request_body = Vec<String>,
    responses(
        (status = 200, description = "Rebuilt schema", body = SchemaDto),
        (status = 400, description = "DDL batch failed, database unchanged"),
        (status = 404, description = "Database not found"),
    )
)]
pub async fn update_schema(
    Extension(handler): Extension<Arc<Handler>>,
    Path(db_id): Path<String>,
    Json(statements): Json<Vec<String>>,
) -> Result<Json<SchemaDto>, RestError> {
    let schema = handler.update_database(&db_id, statements).await?;
    Ok(Json(SchemaDto::from(schema.as_ref())))
}

/// Preview the generator input for a database
#[utoipa::path(
    get,
    path = "/serialized-schema/{db_id}",
    tag = "schema",
    params(
        ("db_id" = String, Path, description = "Database id"),
        SerializedSchemaParams,
    ),
    responses(
        (status = 200, description = "Serialized schema with placeholder question", body = String),
        (status = 400, description = "Unknown serialization style"),
        (status = 404, description = "Database not found"),
    )
)]
pub async fn serialized_schema(
    Extension(handler): Extension<Arc<Handler>>,
    Path(db_id): Path<String>,
    Query(params): Query<SerializedSchemaParams>,
) -> Result<Json<String>, RestError> {
    let overrides = params.overrides()?;
    Ok(Json(handler.serialized_schema(&db_id, &overrides).await?))
}
