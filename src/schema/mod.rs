//! # Database Schema Module
//!
//! Structural metadata for the SQLite databases the service translates
//! against, plus everything derived from it:
//! - introspection of on-disk files ([`introspect`])
//! - the process-wide cache with single-flight loading ([`store`])
//! - textual rendering for the sequence generator ([`serialize`])
//! - DDL-based create/update administration ([`admin`])
//!
//! A [`Schema`] is a flat index-linked view of one database:
//!
//! ```text
//! tables:       [ concert, stadium ]
//! columns:      [ (0, concert_id), (0, stadium_id), (1, stadium_id), (1, name) ]
//! foreign_keys: [ 1 -> 2 ]
//! ```
//!
//! Columns carry the index of their table; foreign keys carry indices into
//! `columns`. The flat layout keeps serialization order-stable and makes
//! the bounds invariants checkable in one pass.

pub mod admin;
pub mod introspect;
pub mod serialize;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::error::{TranslateError, TranslateResult};

// Re-export public types
pub use admin::SchemaAdmin;
pub use introspect::{Introspector, SqliteIntrospector};
pub use serialize::{SchemaSerializer, SerializationOverrides};
pub use store::SchemaStore;

/// A table in an introspected schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name as stored in `sqlite_master`
    pub name: String,
}

/// A column, linked to its table by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Index into [`Schema::tables`]
    pub table_index: usize,
    /// Column name as reported by `pragma_table_info`
    pub name: String,
}

/// One foreign-key pair, both sides as indices into [`Schema::columns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from_column: usize,
    pub to_column: usize,
}

/// Complete structural metadata for one database.
///
/// Built once per `db_id` by [`introspect::read_schema`], then cached as
/// `Arc<Schema>` by the [`SchemaStore`] until a mutation invalidates it.
/// Immutable while cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Database identifier (directory and file stem under the db root)
    pub db_id: String,
    /// Tables in introspection order (alphabetical)
    pub tables: Vec<Table>,
    /// Columns in table order, then declaration order within each table
    pub columns: Vec<Column>,
    /// Foreign keys in table order
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    /// Create an empty schema for the given database id.
    pub fn new(db_id: impl Into<String>) -> Self {
        Schema {
            db_id: db_id.into(),
            tables: Vec::new(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Columns belonging to the table at `table_index`, in declaration order.
    pub fn columns_of(&self, table_index: usize) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |c| c.table_index == table_index)
    }

    /// `table.column` label for the column at `column_index`.
    ///
    /// Returns `None` when either index is out of bounds; validated
    /// schemas never hit that case.
    pub fn qualified_column(&self, column_index: usize) -> Option<String> {
        let column = self.columns.get(column_index)?;
        let table = self.tables.get(column.table_index)?;
        Some(format!("{}.{}", table.name, column.name))
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Check the index invariants: every column points at an existing
    /// table, every foreign-key side at an existing column.
    ///
    /// Introspection calls this before handing a schema out; a violation
    /// means the builder itself is broken, surfaced as a read failure
    /// rather than a panic somewhere downstream.
    pub fn validate(&self) -> TranslateResult<()> {
        for (i, column) in self.columns.iter().enumerate() {
            if column.table_index >= self.tables.len() {
                return Err(TranslateError::SchemaRead {
                    db_id: self.db_id.clone(),
                    message: format!(
                        "column {i} ('{}') references table index {} out of {}",
                        column.name,
                        column.table_index,
                        self.tables.len()
                    ),
                });
            }
        }
        for (i, fk) in self.foreign_keys.iter().enumerate() {
            for side in [fk.from_column, fk.to_column] {
                if side >= self.columns.len() {
                    return Err(TranslateError::SchemaRead {
                        db_id: self.db_id.clone(),
                        message: format!(
                            "foreign key {i} references column index {side} out of {}",
                            self.columns.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema {
            db_id: "concert_singer".to_string(),
            tables: vec![
                Table {
                    name: "concert".to_string(),
                },
                Table {
                    name: "stadium".to_string(),
                },
            ],
            columns: vec![
                Column {
                    table_index: 0,
                    name: "concert_id".to_string(),
                },
                Column {
                    table_index: 0,
                    name: "stadium_id".to_string(),
                },
                Column {
                    table_index: 1,
                    name: "stadium_id".to_string(),
                },
                Column {
                    table_index: 1,
                    name: "name".to_string(),
                },
            ],
            foreign_keys: vec![ForeignKey {
                from_column: 1,
                to_column: 2,
            }],
        }
    }

    #[test]
    fn test_columns_of_filters_by_table() {
        let schema = sample_schema();
        let names: Vec<&str> = schema.columns_of(1).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["stadium_id", "name"]);
    }

    #[test]
    fn test_qualified_column() {
        let schema = sample_schema();
        assert_eq!(
            schema.qualified_column(1),
            Some("concert.stadium_id".to_string())
        );
        assert_eq!(schema.qualified_column(99), None);
    }

    #[test]
    fn test_validate_accepts_consistent_schema() {
        assert!(sample_schema().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_table_index() {
        let mut schema = sample_schema();
        schema.columns[0].table_index = 7;
        let err = schema.validate().unwrap_err();
        assert!(matches!(err, TranslateError::SchemaRead { .. }));
        assert!(err.to_string().contains("table index 7"));
    }

    #[test]
    fn test_validate_rejects_dangling_foreign_key() {
        let mut schema = sample_schema();
        schema.foreign_keys.push(ForeignKey {
            from_column: 0,
            to_column: 42,
        });
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_schema_json_roundtrip() {
        let schema = sample_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
