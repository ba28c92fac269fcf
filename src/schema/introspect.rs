//! SQLite structural introspection.
//!
//! Reads table, column, and foreign-key metadata out of a database file
//! using the pragma table-valued functions (`pragma_table_info`,
//! `pragma_foreign_key_list`). All access is read-only; the store runs
//! these calls on the blocking pool.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::error::{TranslateError, TranslateResult};
use crate::schema::{Column, ForeignKey, Schema, Table};

/// Structural read of a database file.
///
/// The store depends on this seam rather than on rusqlite directly so
/// tests can count or stall builds.
pub trait Introspector: Send + Sync {
    fn introspect(&self, db_id: &str, db_file: &Path) -> TranslateResult<Schema>;
}

/// Production introspector backed by the pragma table-valued functions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteIntrospector;

impl Introspector for SqliteIntrospector {
    fn introspect(&self, db_id: &str, db_file: &Path) -> TranslateResult<Schema> {
        read_schema(db_id, db_file)
    }
}

/// Read the complete structural metadata of `db_file`.
///
/// Tables come back in alphabetical order, columns in declaration order
/// within each table. Foreign keys that reference a table's implicit
/// primary key (a bare `REFERENCES t`) are resolved to that key; pairs
/// that cannot be resolved at all are skipped rather than invented.
pub fn read_schema(db_id: &str, db_file: &Path) -> TranslateResult<Schema> {
    let read_err = |e: rusqlite::Error| TranslateError::SchemaRead {
        db_id: db_id.to_string(),
        message: e.to_string(),
    };

    let conn =
        Connection::open_with_flags(db_file, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(read_err)?;

    let table_names = list_tables(&conn).map_err(read_err)?;

    let mut schema = Schema::new(db_id);
    // (lowercased table, lowercased column) -> index into schema.columns
    let mut column_index: HashMap<(String, String), usize> = HashMap::new();
    // lowercased table -> name of its first primary-key column
    let mut primary_keys: HashMap<String, String> = HashMap::new();

    for (table_idx, name) in table_names.iter().enumerate() {
        let infos = table_info(&conn, name).map_err(read_err)?;
        for info in &infos {
            column_index.insert(
                (name.to_lowercase(), info.name.to_lowercase()),
                schema.columns.len(),
            );
            schema.columns.push(Column {
                table_index: table_idx,
                name: info.name.clone(),
            });
        }
        if let Some(pk) = infos
            .iter()
            .filter(|c| c.pk_rank > 0)
            .min_by_key(|c| c.pk_rank)
        {
            primary_keys.insert(name.to_lowercase(), pk.name.clone());
        }
        schema.tables.push(Table { name: name.clone() });
    }

    for name in &table_names {
        for fk in foreign_key_list(&conn, name).map_err(read_err)? {
            let to_table = fk.to_table.to_lowercase();
            let to_column = match fk.to_column {
                Some(c) => c,
                // A bare `REFERENCES t` points at t's primary key.
                None => match primary_keys.get(&to_table) {
                    Some(pk) => pk.clone(),
                    None => {
                        tracing::debug!(
                            db_id,
                            table = %name,
                            "skipping foreign key without a resolvable target column"
                        );
                        continue;
                    }
                },
            };
            let from = column_index.get(&(name.to_lowercase(), fk.from_column.to_lowercase()));
            let to = column_index.get(&(to_table, to_column.to_lowercase()));
            match (from, to) {
                (Some(&from_column), Some(&to_column)) => {
                    schema.foreign_keys.push(ForeignKey {
                        from_column,
                        to_column,
                    });
                }
                _ => {
                    tracing::debug!(db_id, table = %name, "skipping dangling foreign key");
                }
            }
        }
    }

    schema.validate()?;
    Ok(schema)
}

fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

struct ColumnInfo {
    name: String,
    /// 0 when the column is not part of the primary key, 1-based rank otherwise
    pk_rank: i64,
}

fn table_info(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare("SELECT name, pk FROM pragma_table_info(?1)")?;
    let infos = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                pk_rank: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(infos)
}

struct RawForeignKey {
    to_table: String,
    from_column: String,
    /// None for `REFERENCES t` without an explicit column
    to_column: Option<String>,
}

fn foreign_key_list(conn: &Connection, table: &str) -> rusqlite::Result<Vec<RawForeignKey>> {
    let mut stmt =
        conn.prepare("SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1)")?;
    let fks = stmt
        .query_map([table], |row| {
            Ok(RawForeignKey {
                to_table: row.get(0)?,
                from_column: row.get(1)?,
                to_column: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(fks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture_db(dir: &Path, ddl: &str) -> PathBuf {
        let path = dir.join("fixture.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(ddl).unwrap();
        path
    }

    #[test]
    fn test_read_schema_tables_sorted_columns_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(
            dir.path(),
            "CREATE TABLE stadium (stadium_id INTEGER PRIMARY KEY, name TEXT, capacity INTEGER);
             CREATE TABLE concert (concert_id INTEGER PRIMARY KEY, stadium_id INTEGER REFERENCES stadium(stadium_id), year INTEGER);",
        );

        let schema = read_schema("concert_singer", &path).unwrap();

        let tables: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["concert", "stadium"]);

        let concert_columns: Vec<&str> = schema.columns_of(0).map(|c| c.name.as_str()).collect();
        assert_eq!(concert_columns, vec!["concert_id", "stadium_id", "year"]);

        assert_eq!(schema.foreign_keys.len(), 1);
        let fk = schema.foreign_keys[0];
        assert_eq!(
            schema.qualified_column(fk.from_column).unwrap(),
            "concert.stadium_id"
        );
        assert_eq!(
            schema.qualified_column(fk.to_column).unwrap(),
            "stadium.stadium_id"
        );
    }

    #[test]
    fn test_read_schema_resolves_implicit_primary_key_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_db(
            dir.path(),
            "CREATE TABLE author (id INTEGER PRIMARY KEY, label TEXT);
             CREATE TABLE book (author_ref INTEGER REFERENCES author);",
        );

        let schema = read_schema("library", &path).unwrap();
        assert_eq!(schema.foreign_keys.len(), 1);
        let fk = schema.foreign_keys[0];
        assert_eq!(
            schema.qualified_column(fk.from_column).unwrap(),
            "book.author_ref"
        );
        assert_eq!(schema.qualified_column(fk.to_column).unwrap(), "author.id");
    }

    #[test]
    fn test_read_schema_skips_internal_sqlite_tables() {
        let dir = tempfile::tempdir().unwrap();
        // AUTOINCREMENT forces the sqlite_sequence bookkeeping table into existence
        let path = fixture_db(
            dir.path(),
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);
             INSERT INTO t (v) VALUES ('x');",
        );

        let schema = read_schema("seq", &path).unwrap();
        let tables: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["t"]);
    }

    #[test]
    fn test_read_schema_rejects_non_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.sqlite");
        std::fs::write(&path, b"this is not a sqlite file, not even close").unwrap();

        let err = read_schema("broken", &path).unwrap_err();
        assert!(matches!(err, TranslateError::SchemaRead { .. }));
    }

    #[test]
    fn test_read_schema_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.sqlite");
        Connection::open(&path).unwrap();

        let schema = read_schema("empty", &path).unwrap();
        assert!(schema.tables.is_empty());
        assert!(schema.columns.is_empty());
        assert!(schema.foreign_keys.is_empty());
    }
}
