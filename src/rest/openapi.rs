//! `OpenAPI` Specification
//!
//! Defines the `OpenAPI` documentation for the REST API using utoipa.

use utoipa::OpenApi;

use super::dto::{AskEntryDto, AskWithSchemaRequest, ForeignKeyDto, HealthDto, SchemaDto, TableDto};
use super::handlers::{ask, databases, schema};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "nl2sql API",
        version = "0.1.0",
        description = "REST API for the nl2sql translation server",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0"
        )
    ),
    paths(
        databases::health,
        databases::list_databases,
        schema::get_schema,
        schema::create_schema,
        schema::update_schema,
        schema::serialized_schema,
        ask::ask,
        ask::ask_with_schema,
    ),
    components(schemas(
        HealthDto,
        SchemaDto,
        TableDto,
        ForeignKeyDto,
        AskEntryDto,
        AskWithSchemaRequest,
    )),
    tags(
        (name = "admin", description = "Server health"),
        (name = "databases", description = "Database listing"),
        (name = "schema", description = "Schema introspection and DDL administration"),
        (name = "translation", description = "Natural language to SQL translation")
    )
)]
pub struct ApiDoc;
