//! # Query Execution
//!
//! Runs candidate SQL against a catalog database. One connection per
//! request batch, opened before the first candidate and dropped after
//! the last. A failing candidate becomes an error outcome carrying the
//! engine message; its siblings still run. Runs on the blocking pool.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::error::{TranslateError, TranslateResult};

/// Result of running one candidate query. A batch preserves candidate
/// order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The candidate ran; `rows` may be empty.
    Rows {
        query: String,
        rows: Vec<Vec<serde_json::Value>>,
    },
    /// The candidate failed; `message` is display-ready and names the
    /// query and the engine error.
    Failed { query: String, message: String },
}

impl ExecutionOutcome {
    pub fn query(&self) -> &str {
        match self {
            ExecutionOutcome::Rows { query, .. } | ExecutionOutcome::Failed { query, .. } => query,
        }
    }
}

/// Executes candidate batches against database files.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryExecutor;

impl QueryExecutor {
    /// Run every candidate in order against `db_file`.
    ///
    /// Only failing to open the connection aborts the call; individual
    /// candidate failures are captured inline.
    pub async fn execute(
        &self,
        db_file: PathBuf,
        queries: Vec<String>,
    ) -> TranslateResult<Vec<ExecutionOutcome>> {
        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_file)?;
            Ok(queries
                .into_iter()
                .map(|query| run_candidate(&conn, query))
                .collect())
        })
        .await?
    }
}

fn open_connection(db_file: &Path) -> TranslateResult<Connection> {
    // No CREATE flag: a vanished file is an error, not a fresh database.
    Connection::open_with_flags(db_file, OpenFlags::SQLITE_OPEN_READ_WRITE).map_err(|e| {
        TranslateError::internal(format!("cannot open {}: {e}", db_file.display()))
    })
}

fn run_candidate(conn: &Connection, query: String) -> ExecutionOutcome {
    match fetch_rows(conn, &query) {
        Ok(rows) => ExecutionOutcome::Rows { query, rows },
        Err(e) => {
            let err = TranslateError::Execution {
                query: query.clone(),
                message: e.to_string(),
            };
            ExecutionOutcome::Failed {
                query,
                message: err.to_string(),
            }
        }
    }
}

fn fetch_rows(conn: &Connection, query: &str) -> rusqlite::Result<Vec<Vec<serde_json::Value>>> {
    let mut stmt = conn.prepare(query)?;
    let column_count = stmt.column_count();
    let mut out = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            cells.push(value_to_json(row.get_ref(i)?));
        }
        out.push(cells);
    }
    Ok(out)
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
