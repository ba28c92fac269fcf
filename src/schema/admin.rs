//! # Schema Administration
//!
//! DDL-based create and update of catalog databases. Every mutation is
//! all-or-nothing: the statement batch runs inside one transaction, and
//! a failed create removes the file it was building. Mutations take the
//! same per-id lock the store uses for cache builds, so no reader ever
//! introspects a file mid-rewrite.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;

use crate::error::{TranslateError, TranslateResult};
use crate::schema::store::{validate_db_id, SchemaStore};
use crate::schema::{introspect, Schema};

/// Create/update operations over the store's database root.
pub struct SchemaAdmin {
    store: Arc<SchemaStore>,
}

impl SchemaAdmin {
    pub fn new(store: Arc<SchemaStore>) -> Self {
        SchemaAdmin { store }
    }

    /// Create database `db_id` by applying `statements`.
    ///
    /// Fails with `AlreadyExists` when the database file is present; not
    /// idempotent. On any DDL failure nothing is left behind: the
    /// transaction rolls back and the fresh file is removed. On success
    /// the new schema is introspected, cached, and returned.
    pub async fn create(
        &self,
        db_id: &str,
        statements: Vec<String>,
    ) -> TranslateResult<Arc<Schema>> {
        validate_db_id(db_id)?;
        let _guard = self.store.begin_flight(db_id).await;

        let db_file = self.store.db_file_path(db_id);
        if db_file.exists() {
            return Err(TranslateError::AlreadyExists {
                db_id: db_id.to_string(),
            });
        }
        if let Some(parent) = db_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TranslateError::internal(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        tracing::info!(db_id, statements = statements.len(), "creating database");
        match apply_and_introspect(db_id, &db_file, statements).await {
            Ok(schema) => {
                let schema = Arc::new(schema);
                self.store.prime(Arc::clone(&schema));
                Ok(schema)
            }
            Err(e) => {
                // Leave no half-created database behind.
                let _ = std::fs::remove_file(&db_file);
                if let Some(parent) = db_file.parent() {
                    let _ = std::fs::remove_dir(parent);
                }
                Err(e)
            }
        }
    }

    /// Apply `statements` to the existing database `db_id`.
    ///
    /// Fails with `NotFound` when absent. A failing batch rolls back,
    /// leaving both the file and the cached schema untouched. On success
    /// the rebuilt schema replaces the cached entry and is returned.
    pub async fn update(
        &self,
        db_id: &str,
        statements: Vec<String>,
    ) -> TranslateResult<Arc<Schema>> {
        validate_db_id(db_id)?;
        let _guard = self.store.begin_flight(db_id).await;

        let db_file = self.store.db_file_path(db_id);
        if !db_file.is_file() {
            return Err(TranslateError::NotFound {
                db_id: db_id.to_string(),
            });
        }

        tracing::info!(db_id, statements = statements.len(), "updating database");
        let schema = apply_and_introspect(db_id, &db_file, statements).await?;
        let schema = Arc::new(schema);
        self.store.prime(Arc::clone(&schema));
        Ok(schema)
    }
}

/// Run the batch in one transaction, then re-read the schema.
async fn apply_and_introspect(
    db_id: &str,
    db_file: &Path,
    statements: Vec<String>,
) -> TranslateResult<Schema> {
    let id = db_id.to_string();
    let path = db_file.to_path_buf();
    tokio::task::spawn_blocking(move || {
        apply_ddl(&path, &statements).map_err(|e| TranslateError::Ddl {
            message: e.to_string(),
        })?;
        introspect::read_schema(&id, &path)
    })
    .await?
}

/// All statements in one transaction; dropping the transaction on an
/// early return rolls everything back.
fn apply_ddl(db_file: &Path, statements: &[String]) -> rusqlite::Result<()> {
    let mut conn = Connection::open(db_file)?;
    let tx = conn.transaction()?;
    for statement in statements {
        tx.execute_batch(statement)?;
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_admin() -> (tempfile::TempDir, Arc<SchemaStore>, SchemaAdmin) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SchemaStore::new(dir.path()));
        let admin = SchemaAdmin::new(Arc::clone(&store));
        (dir, store, admin)
    }

    #[tokio::test]
    async fn test_create_returns_schema_and_writes_file() {
        let (_dir, store, admin) = make_admin();
        let schema = admin
            .create(
                "shop",
                vec!["CREATE TABLE item (item_id INTEGER PRIMARY KEY, label TEXT)".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(schema.tables[0].name, "item");
        assert!(store.db_file_path("shop").is_file());
    }

    #[tokio::test]
    async fn test_second_create_is_rejected() {
        let (_dir, _store, admin) = make_admin();
        admin
            .create("shop", vec!["CREATE TABLE item (a)".to_string()])
            .await
            .unwrap();
        let err = admin
            .create("shop", vec!["CREATE TABLE other (b)".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing_behind() {
        let (_dir, store, admin) = make_admin();
        let err = admin
            .create(
                "broken",
                vec![
                    "CREATE TABLE ok (a)".to_string(),
                    "CREATE TABL oops".to_string(),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Ddl { .. }));
        assert!(err.to_string().contains("syntax error"));
        assert!(!store.db_file_path("broken").exists());
    }

    #[tokio::test]
    async fn test_update_missing_database_is_not_found() {
        let (_dir, _store, admin) = make_admin();
        let err = admin
            .update("ghost", vec!["CREATE TABLE t (a)".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back() {
        let (_dir, store, admin) = make_admin();
        admin
            .create("ledger", vec!["CREATE TABLE t (a)".to_string()])
            .await
            .unwrap();

        let err = admin
            .update(
                "ledger",
                vec![
                    "CREATE TABLE u (b)".to_string(),
                    "CREATE TABL nope".to_string(),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Ddl { .. }));

        // On-disk state is unchanged, not just the cache.
        let on_disk =
            introspect::read_schema("ledger", &store.db_file_path("ledger")).unwrap();
        let tables: Vec<&str> = on_disk.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["t"]);
    }

    #[tokio::test]
    async fn test_update_replaces_cached_schema() {
        let (_dir, store, admin) = make_admin();
        admin
            .create("grow", vec!["CREATE TABLE t (a)".to_string()])
            .await
            .unwrap();
        assert_eq!(store.resolve("grow").await.unwrap().tables.len(), 1);

        let schema = admin
            .update("grow", vec!["CREATE TABLE u (b)".to_string()])
            .await
            .unwrap();
        assert_eq!(schema.tables.len(), 2);
        assert_eq!(store.resolve("grow").await.unwrap().tables.len(), 2);
    }
}
