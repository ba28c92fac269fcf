//! # Schema Store
//!
//! Process-wide cache of introspected schemas, keyed by database id.
//!
//! The store owns the `<root>/<db_id>/<db_id>.sqlite` layout convention,
//! the cache itself, and the per-id locks that make cache builds
//! single-flight: any number of concurrent first requests for one id
//! produce exactly one introspection pass. Cached hits are lock-free
//! reads. Mutations (see [`super::admin`]) take the same per-id lock, so
//! a schema is never read while its file is mid-rewrite. Lock entries
//! are transient: the last task out removes them, so the lock map is
//! bounded by in-flight work, not by every id ever requested.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{TranslateError, TranslateResult};
use crate::schema::introspect::{Introspector, SqliteIntrospector};
use crate::schema::Schema;

/// Reject ids that would not be safe as a path component.
///
/// Ids double as directory and file names, so only `[A-Za-z0-9_-]` is
/// accepted; everything else (separators, dots, empty) fails before any
/// filesystem access happens.
pub fn validate_db_id(db_id: &str) -> TranslateResult<()> {
    let ok = !db_id.is_empty()
        && db_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(TranslateError::Config {
            message: format!("invalid database id '{db_id}' (allowed: letters, digits, '_', '-')"),
        })
    }
}

/// Cache of per-database structural metadata.
pub struct SchemaStore {
    db_root: PathBuf,
    introspector: Arc<dyn Introspector>,
    cache: DashMap<String, Arc<Schema>>,
    flights: DashMap<String, Arc<Mutex<()>>>,
}

impl SchemaStore {
    pub fn new(db_root: impl Into<PathBuf>) -> Self {
        Self::with_introspector(db_root, Arc::new(SqliteIntrospector))
    }

    /// Construct with a custom introspector. Test seam; production code
    /// uses [`SchemaStore::new`].
    pub fn with_introspector(
        db_root: impl Into<PathBuf>,
        introspector: Arc<dyn Introspector>,
    ) -> Self {
        SchemaStore {
            db_root: db_root.into(),
            introspector,
            cache: DashMap::new(),
            flights: DashMap::new(),
        }
    }

    /// The single place the `<root>/<db_id>/<db_id>.sqlite` layout is
    /// spelled.
    pub fn db_file_path(&self, db_id: &str) -> PathBuf {
        self.db_root.join(db_id).join(format!("{db_id}.sqlite"))
    }

    pub fn db_root(&self) -> &Path {
        &self.db_root
    }

    /// Cached schema lookup, introspecting on first access.
    ///
    /// Concurrent calls for the same uncached id perform exactly one
    /// introspection: the first caller builds under the per-id lock and
    /// later callers find the cache populated once the lock releases. A
    /// failed build leaves the key clean, so the next caller retries
    /// instead of inheriting a poisoned entry.
    pub async fn resolve(&self, db_id: &str) -> TranslateResult<Arc<Schema>> {
        validate_db_id(db_id)?;
        if let Some(entry) = self.cache.get(db_id) {
            return Ok(Arc::clone(entry.value()));
        }

        let _guard = self.begin_flight(db_id).await;

        // Re-check: another task may have built while we waited.
        if let Some(entry) = self.cache.get(db_id) {
            return Ok(Arc::clone(entry.value()));
        }

        let db_file = self.db_file_path(db_id);
        if !db_file.is_file() {
            return Err(TranslateError::NotFound {
                db_id: db_id.to_string(),
            });
        }

        let introspector = Arc::clone(&self.introspector);
        let id = db_id.to_string();
        let schema =
            tokio::task::spawn_blocking(move || introspector.introspect(&id, &db_file)).await??;

        let schema = Arc::new(schema);
        self.cache.insert(db_id.to_string(), Arc::clone(&schema));
        tracing::debug!(db_id, tables = schema.tables.len(), "schema cached");
        Ok(schema)
    }

    /// Drop the cached entry for `db_id`, and its lock entry when idle.
    /// No-op when absent.
    pub fn invalidate(&self, db_id: &str) {
        if self.cache.remove(db_id).is_some() {
            tracing::debug!(db_id, "schema cache entry invalidated");
        }
        self.release_flight(db_id);
    }

    /// Install a freshly built schema, replacing any cached entry.
    pub(crate) fn prime(&self, schema: Arc<Schema>) {
        self.cache.insert(schema.db_id.clone(), schema);
    }

    /// Acquire the per-id build/mutation lock.
    ///
    /// Admin mutations and cache builds for the same id serialize on
    /// this; different ids proceed independently. Dropping the guard
    /// releases the lock and removes its entry once no other task holds
    /// or awaits it, so ids that are requested but never built leave
    /// nothing behind.
    pub(crate) async fn begin_flight(&self, db_id: &str) -> FlightGuard<'_> {
        let lock = self
            .flights
            .entry(db_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        FlightGuard {
            store: self,
            db_id: db_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Remove the `db_id` lock entry once no task holds or awaits it.
    fn release_flight(&self, db_id: &str) {
        self.flights
            .remove_if(db_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Ids of every database under the root that follows the
    /// `<db_id>/<db_id>.sqlite` naming convention, sorted.
    ///
    /// Directories whose database file is named differently are not
    /// databases in this catalog and are skipped.
    pub fn list_databases(&self) -> TranslateResult<Vec<String>> {
        let mut ids = Vec::new();
        if !self.db_root.is_dir() {
            return Ok(ids);
        }
        let entries = std::fs::read_dir(&self.db_root).map_err(|e| {
            TranslateError::internal(format!(
                "cannot read database root {}: {e}",
                self.db_root.display()
            ))
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.join(format!("{name}.sqlite")).is_file() {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Held per-id lock; see [`SchemaStore::begin_flight`].
#[must_use]
pub(crate) struct FlightGuard<'a> {
    store: &'a SchemaStore,
    db_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Release the lock before checking for other users.
        drop(self.guard.take());
        self.store.release_flight(&self.db_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingIntrospector {
        calls: AtomicUsize,
    }

    impl CountingIntrospector {
        fn new() -> Arc<Self> {
            Arc::new(CountingIntrospector {
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Introspector for CountingIntrospector {
        fn introspect(&self, db_id: &str, _db_file: &Path) -> TranslateResult<Schema> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Schema::new(db_id))
        }
    }

    fn touch_db(root: &Path, db_id: &str) {
        let dir = root.join(db_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{db_id}.sqlite")), b"").unwrap();
    }

    #[test]
    fn test_db_file_path_convention() {
        let store = SchemaStore::new("/data/db");
        assert_eq!(
            store.db_file_path("concert_singer"),
            PathBuf::from("/data/db/concert_singer/concert_singer.sqlite")
        );
    }

    #[test]
    fn test_validate_db_id() {
        assert!(validate_db_id("concert_singer").is_ok());
        assert!(validate_db_id("db-2024").is_ok());
        assert!(validate_db_id("").is_err());
        assert!(validate_db_id("../etc").is_err());
        assert!(validate_db_id("a/b").is_err());
        assert!(validate_db_id("a.sqlite").is_err());
    }

    #[test]
    fn test_list_databases_requires_self_named_file() {
        let dir = tempfile::tempdir().unwrap();
        touch_db(dir.path(), "x");
        // y's file does not match its directory name
        let stray = dir.path().join("y");
        std::fs::create_dir_all(&stray).unwrap();
        std::fs::write(stray.join("z.sqlite"), b"").unwrap();

        let store = SchemaStore::new(dir.path());
        assert_eq!(store.list_databases().unwrap(), vec!["x".to_string()]);
    }

    #[test]
    fn test_list_databases_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch_db(dir.path(), "beta");
        touch_db(dir.path(), "alpha");

        let store = SchemaStore::new(dir.path());
        assert_eq!(
            store.list_databases().unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn test_list_databases_missing_root_is_empty() {
        let store = SchemaStore::new("/nonexistent/nl2sql-root");
        assert!(store.list_databases().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());
        let err = store.resolve("missing").await.unwrap_err();
        assert!(matches!(err, TranslateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_invalid_id_fails_before_filesystem() {
        let store = SchemaStore::new("/nonexistent/nl2sql-root");
        let err = store.resolve("../../etc").await.unwrap_err();
        assert!(matches!(err, TranslateError::Config { .. }));
    }

    #[tokio::test]
    async fn test_resolve_caches_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        touch_db(dir.path(), "cached");
        let introspector = CountingIntrospector::new();
        let store = SchemaStore::with_introspector(dir.path(), Arc::clone(&introspector) as _);

        store.resolve("cached").await.unwrap();
        store.resolve("cached").await.unwrap();
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);

        store.invalidate("cached");
        store.resolve("cached").await.unwrap();
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_build_does_not_poison_the_key() {
        struct FailOnce {
            calls: AtomicUsize,
        }
        impl Introspector for FailOnce {
            fn introspect(&self, db_id: &str, _db_file: &Path) -> TranslateResult<Schema> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TranslateError::SchemaRead {
                        db_id: db_id.to_string(),
                        message: "transient".to_string(),
                    })
                } else {
                    Ok(Schema::new(db_id))
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        touch_db(dir.path(), "flaky");
        let store = SchemaStore::with_introspector(
            dir.path(),
            Arc::new(FailOnce {
                calls: AtomicUsize::new(0),
            }),
        );

        assert!(store.resolve("flaky").await.is_err());
        assert!(store.resolve("flaky").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_id_resolves_leave_no_lock_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());

        for i in 0..100 {
            let err = store.resolve(&format!("no-such-db-{i}")).await.unwrap_err();
            assert!(matches!(err, TranslateError::NotFound { .. }));
        }
        assert!(store.flights.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entries_dropped_after_build_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        touch_db(dir.path(), "transient");
        let introspector = CountingIntrospector::new();
        let store = SchemaStore::with_introspector(dir.path(), Arc::clone(&introspector) as _);

        store.resolve("transient").await.unwrap();
        assert!(store.flights.is_empty());

        store.invalidate("transient");
        store.resolve("transient").await.unwrap();
        assert!(store.flights.is_empty());
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_drops_idle_lock_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());
        // A task cancelled while waiting for the lock leaves its entry
        // behind; invalidation must not strand it.
        store
            .flights
            .insert("stale".to_string(), Arc::new(Mutex::new(())));

        store.invalidate("stale");
        assert!(store.flights.is_empty());
    }

    #[tokio::test]
    async fn test_admin_mutations_leave_no_lock_entries() {
        use crate::schema::SchemaAdmin;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SchemaStore::new(dir.path()));
        let admin = SchemaAdmin::new(Arc::clone(&store));

        let err = admin
            .update("ghost", vec!["CREATE TABLE t (a)".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::NotFound { .. }));
        assert!(store.flights.is_empty());

        admin
            .create("shop", vec!["CREATE TABLE item (a)".to_string()])
            .await
            .unwrap();
        assert!(store.flights.is_empty());
    }
}
