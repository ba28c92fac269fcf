//! REST API Data Transfer Objects
//!
//! Request/response types for the REST endpoints. Response shapes for
//! the translation endpoints are part of the wire contract and stay
//! bare (no envelope): `/ask` returns an array of per-candidate
//! entries, `/ask-with-schema` an array of SQL strings.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::TranslateResult;
use crate::execute::ExecutionOutcome;
use crate::schema::{Schema, SerializationOverrides};

// Admin DTOs
/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Number of databases currently present under the root
    pub databases: usize,
}

// Schema DTOs
/// A table and its columns, in declaration order
#[derive(Debug, Serialize, ToSchema)]
pub struct TableDto {
    pub name: String,
    pub columns: Vec<String>,
}

/// One foreign key as qualified `table.column` labels
#[derive(Debug, Serialize, ToSchema)]
pub struct ForeignKeyDto {
    pub from: String,
    pub to: String,
}

/// Introspected schema of one database
#[derive(Debug, Serialize, ToSchema)]
pub struct SchemaDto {
    pub db_id: String,
    pub tables: Vec<TableDto>,
    pub foreign_keys: Vec<ForeignKeyDto>,
}

impl From<&Schema> for SchemaDto {
    fn from(schema: &Schema) -> Self {
        let tables = schema
            .tables
            .iter()
            .enumerate()
            .map(|(i, table)| TableDto {
                name: table.name.clone(),
                columns: schema.columns_of(i).map(|c| c.name.clone()).collect(),
            })
            .collect();
        // Validated schemas never yield unresolvable sides.
        let foreign_keys = schema
            .foreign_keys
            .iter()
            .filter_map(|fk| {
                Some(ForeignKeyDto {
                    from: schema.qualified_column(fk.from_column)?,
                    to: schema.qualified_column(fk.to_column)?,
                })
            })
            .collect();
        SchemaDto {
            db_id: schema.db_id.clone(),
            tables,
            foreign_keys,
        }
    }
}

// Translation DTOs
/// Query parameters for `/ask`
#[derive(Debug, Deserialize, IntoParams)]
pub struct AskParams {
    /// Database to translate against
    pub db_id: String,
    /// Natural-language question
    pub question: String,
}

/// One candidate in an `/ask` response: either its rows or the
/// execution error, never both
#[derive(Debug, Serialize, ToSchema)]
pub struct AskEntryDto {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_results: Option<Vec<Vec<serde_json::Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionOutcome> for AskEntryDto {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Rows { query, rows } => AskEntryDto {
                query,
                execution_results: Some(rows),
                error: None,
            },
            ExecutionOutcome::Failed { query, message } => AskEntryDto {
                query,
                execution_results: None,
                error: Some(message),
            },
        }
    }
}

/// Request body for `/ask-with-schema`
#[derive(Debug, Deserialize, ToSchema)]
pub struct AskWithSchemaRequest {
    /// Natural-language question
    pub question: String,
    /// Pre-serialized schema text, used verbatim
    pub db_schema: String,
}

/// Query parameters for `/serialized-schema/{db_id}`; absent parameters
/// fall back to the configured serialization defaults
#[derive(Debug, Deserialize, IntoParams)]
pub struct SerializedSchemaParams {
    /// Serialization style name (`verbose`, `compact`, `ddl`, `grouped`)
    #[serde(default)]
    pub schema_serialization_type: Option<String>,
    #[serde(default)]
    pub schema_serialization_randomized: Option<bool>,
    #[serde(default)]
    pub schema_serialization_with_db_id: Option<bool>,
    #[serde(default)]
    pub schema_serialization_with_db_content: Option<bool>,
}

impl SerializedSchemaParams {
    /// Parse into overrides; an unknown style name is a config error.
    pub fn overrides(&self) -> TranslateResult<SerializationOverrides> {
        let style = self
            .schema_serialization_type
            .as_deref()
            .map(str::parse)
            .transpose()?;
        Ok(SerializationOverrides {
            style,
            randomize_order: self.schema_serialization_randomized,
            with_db_id: self.schema_serialization_with_db_id,
            with_content: self.schema_serialization_with_db_content,
        })
    }
}
