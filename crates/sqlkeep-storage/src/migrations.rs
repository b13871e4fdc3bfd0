// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named migrations tracked in a ledger table inside the managed database.
//!
//! Each outstanding migration runs in its own transaction together with the
//! ledger insert that records it, so the ledger always matches what is
//! committed. A failed migration is rolled back alone; the ones before it stay.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use sqlkeep_core::{BoxError, ClientError, ExecMode, QueryExecutor, SessionId, SqlValue};

/// Ledger table name. Matches databases written by the browser client so
/// snapshots can move between the two.
pub const LEDGER_TABLE: &str = "__drizzle_migrations";

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS __drizzle_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at INTEGER NOT NULL
);";

const SELECT_APPLIED: &str = "SELECT name FROM __drizzle_migrations";

const INSERT_APPLIED: &str =
    "INSERT INTO __drizzle_migrations (name, applied_at) VALUES (?, strftime('%s','now'))";

/// A named unit of schema change. `sql` may contain several statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

type ProducerFn = dyn Fn() -> Result<Vec<Migration>, BoxError> + Send + Sync;
type AsyncProducerFn =
    dyn Fn() -> BoxFuture<'static, Result<Vec<Migration>, BoxError>> + Send + Sync;

/// Where an open cycle gets its migrations from. Resolved once per open.
#[derive(Clone)]
pub enum MigrationSource {
    /// A fixed, ordered list.
    Literal(Vec<Migration>),
    /// A function returning the list.
    Producer(Arc<ProducerFn>),
    /// A function returning a future of the list.
    AsyncProducer(Arc<AsyncProducerFn>),
}

impl MigrationSource {
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> Result<Vec<Migration>, BoxError> + Send + Sync + 'static,
    {
        MigrationSource::Producer(Arc::new(f))
    }

    pub fn async_producer<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Migration>, BoxError>> + Send + 'static,
    {
        MigrationSource::AsyncProducer(Arc::new(move || f().boxed()))
    }

    /// Loads every `*.sql` file in `dir`, ordered by filename. The file stem is
    /// the migration name, so `V1__init.sql` is recorded as `V1__init`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self::async_producer(move || load_dir(dir.clone()))
    }
}

impl From<Vec<Migration>> for MigrationSource {
    fn from(migrations: Vec<Migration>) -> Self {
        MigrationSource::Literal(migrations)
    }
}

impl std::fmt::Debug for MigrationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationSource::Literal(migrations) => {
                f.debug_tuple("Literal").field(&migrations.len()).finish()
            }
            MigrationSource::Producer(_) => f.write_str("Producer"),
            MigrationSource::AsyncProducer(_) => f.write_str("AsyncProducer"),
        }
    }
}

async fn load_dir(dir: PathBuf) -> Result<Vec<Migration>, BoxError> {
    let mut entries = tokio::fs::read_dir(&dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql") && entry.file_type().await?.is_file()
        {
            files.push(path);
        }
    }
    files.sort();

    let mut migrations = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| format!("migration file without a name: {}", path.display()))?;
        let sql = tokio::fs::read_to_string(&path).await?;
        migrations.push(Migration { name, sql });
    }
    debug!(dir = %dir.display(), count = migrations.len(), "loaded migration files");
    Ok(migrations)
}

/// Turns a migration source into the ordered list to apply.
///
/// An absent source yields nothing. A producer failure becomes
/// [`ClientError::Resolution`].
pub async fn resolve(source: Option<&MigrationSource>) -> Result<Vec<Migration>, ClientError> {
    match source {
        None => Ok(Vec::new()),
        Some(MigrationSource::Literal(migrations)) => Ok(migrations.clone()),
        Some(MigrationSource::Producer(produce)) => {
            produce().map_err(|source| ClientError::Resolution { source })
        }
        Some(MigrationSource::AsyncProducer(produce)) => produce()
            .await
            .map_err(|source| ClientError::Resolution { source }),
    }
}

/// Applies every migration whose name is not yet in the ledger, in order.
///
/// Returns how many migrations were applied. Stops at the first failure.
pub async fn apply(
    executor: &dyn QueryExecutor,
    session: &SessionId,
    migrations: &[Migration],
) -> Result<usize, ClientError> {
    executor
        .exec(session, CREATE_LEDGER, &[], ExecMode::Discard)
        .await?;
    let applied: HashSet<String> = executor
        .exec(session, SELECT_APPLIED, &[], ExecMode::Rows)
        .await?
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(SqlValue::Text(name)) => Some(name),
            _ => None,
        })
        .collect();

    let mut count = 0;
    for migration in migrations {
        if applied.contains(&migration.name) {
            debug!(migration = %migration.name, "already applied");
            continue;
        }
        info!(migration = %migration.name, "applying migration");
        apply_one(executor, session, migration).await?;
        count += 1;
    }
    Ok(count)
}

async fn apply_one(
    executor: &dyn QueryExecutor,
    session: &SessionId,
    migration: &Migration,
) -> Result<(), ClientError> {
    let failed = |source: ClientError| ClientError::Migration {
        name: migration.name.clone(),
        source: Box::new(source),
    };

    executor
        .exec(session, "BEGIN", &[], ExecMode::Discard)
        .await
        .map_err(failed)?;

    let result = async {
        executor
            .exec(session, &migration.sql, &[], ExecMode::Discard)
            .await?;
        executor
            .exec(
                session,
                INSERT_APPLIED,
                &[SqlValue::Text(migration.name.clone())],
                ExecMode::Discard,
            )
            .await?;
        executor
            .exec(session, "COMMIT", &[], ExecMode::Discard)
            .await
    }
    .await;

    if let Err(e) = result {
        if let Err(rollback) = executor
            .exec(session, "ROLLBACK", &[], ExecMode::Discard)
            .await
        {
            warn!(migration = %migration.name, error = %rollback, "rollback failed");
        }
        return Err(failed(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sqlkeep_test_utils::RecordingExecutor;
    use tempfile::tempdir;

    use crate::executor::SqliteExecutor;
    use crate::names::NameScheme;

    fn sample() -> Vec<Migration> {
        vec![
            Migration::new("0001_create_t", "CREATE TABLE t (id INTEGER PRIMARY KEY);"),
            Migration::new(
                "0002_add_label",
                "ALTER TABLE t ADD COLUMN label TEXT; CREATE INDEX t_label ON t(label);",
            ),
        ]
    }

    async fn open(dir: &std::path::Path) -> (Arc<RecordingExecutor<SqliteExecutor>>, SessionId) {
        let executor = Arc::new(RecordingExecutor::new(SqliteExecutor::default()));
        let uri = NameScheme::native(dir).live_uri("migrations").unwrap();
        let session = executor.open(&uri).await.unwrap();
        (executor, session)
    }

    async fn ledger(executor: &dyn QueryExecutor, session: &SessionId) -> Vec<String> {
        executor
            .exec(
                session,
                "SELECT name FROM __drizzle_migrations ORDER BY id",
                &[],
                ExecMode::Rows,
            )
            .await
            .unwrap()
            .into_iter()
            .map(|row| row[0].as_text().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn all_source_variants_resolve_to_the_same_list() {
        let literal = MigrationSource::from(sample());
        let sync = MigrationSource::producer(|| Ok(sample()));
        let async_source = MigrationSource::async_producer(|| async { Ok(sample()) });

        let a = resolve(Some(&literal)).await.unwrap();
        let b = resolve(Some(&sync)).await.unwrap();
        let c = resolve(Some(&async_source)).await.unwrap();
        assert_eq!(a, sample());
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[tokio::test]
    async fn absent_source_resolves_to_nothing() {
        assert!(resolve(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn producer_failures_become_resolution_errors() {
        let sync = MigrationSource::producer(|| Err("bundle missing".into()));
        let err = resolve(Some(&sync)).await.unwrap_err();
        assert!(matches!(err, ClientError::Resolution { .. }));

        let async_source =
            MigrationSource::async_producer(|| async { Err::<Vec<Migration>, _>("fetch failed".into()) });
        let err = resolve(Some(&async_source)).await.unwrap_err();
        assert!(err.to_string().contains("fetch failed"));
    }

    #[tokio::test]
    async fn apply_records_each_migration_in_order() {
        let dir = tempdir().unwrap();
        let (executor, session) = open(dir.path()).await;

        let applied = apply(executor.as_ref(), &session, &sample()).await.unwrap();
        assert_eq!(applied, 2);
        assert_eq!(
            ledger(executor.as_ref(), &session).await,
            vec!["0001_create_t", "0002_add_label"]
        );

        let rows = executor
            .exec(&session, "SELECT applied_at FROM __drizzle_migrations", &[], ExecMode::Rows)
            .await
            .unwrap();
        assert!(rows.iter().all(|row| row[0].as_integer().is_some_and(|ts| ts > 0)));
    }

    #[tokio::test]
    async fn second_pass_runs_no_migration_statements() {
        let dir = tempdir().unwrap();
        let (executor, session) = open(dir.path()).await;
        apply(executor.as_ref(), &session, &sample()).await.unwrap();

        executor.clear_statements();
        let applied = apply(executor.as_ref(), &session, &sample()).await.unwrap();

        assert_eq!(applied, 0);
        // Only the ledger bookkeeping reaches the executor.
        assert_eq!(executor.statements(), vec![CREATE_LEDGER, SELECT_APPLIED]);
        assert_eq!(ledger(executor.as_ref(), &session).await.len(), 2);
    }

    #[tokio::test]
    async fn failed_migration_is_rolled_back_alone_and_retry_resumes() {
        let dir = tempdir().unwrap();
        let (executor, session) = open(dir.path()).await;
        let migrations = vec![
            Migration::new("a", "CREATE TABLE a (id INTEGER);"),
            Migration::new("b", "CREATE TABLE b (id INTEGER); INSERT INTO missing VALUES (1);"),
            Migration::new("c", "CREATE TABLE c (id INTEGER);"),
        ];

        let err = apply(executor.as_ref(), &session, &migrations)
            .await
            .unwrap_err();
        assert!(matches!(&err, ClientError::Migration { name, .. } if name == "b"));
        assert_eq!(ledger(executor.as_ref(), &session).await, vec!["a"]);
        assert!(!executor.statements().iter().any(|s| s.contains("CREATE TABLE c")));

        // Table b was created inside the rolled-back transaction.
        let tables = executor
            .exec(
                &session,
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'b'",
                &[],
                ExecMode::Rows,
            )
            .await
            .unwrap();
        assert!(tables.is_empty());

        let mut fixed = migrations.clone();
        fixed[1].sql = "CREATE TABLE b (id INTEGER);".to_string();
        executor.clear_statements();
        let applied = apply(executor.as_ref(), &session, &fixed).await.unwrap();

        assert_eq!(applied, 2);
        assert!(!executor.statements().iter().any(|s| s.contains("CREATE TABLE a")));
        assert_eq!(ledger(executor.as_ref(), &session).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn order_follows_the_source_not_the_names() {
        let dir = tempdir().unwrap();
        let (executor, session) = open(dir.path()).await;
        let migrations = vec![
            Migration::new("zeta", "CREATE TABLE z (id INTEGER);"),
            Migration::new("alpha", "CREATE TABLE a (id INTEGER);"),
        ];
        apply(executor.as_ref(), &session, &migrations).await.unwrap();
        assert_eq!(ledger(executor.as_ref(), &session).await, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn from_dir_orders_by_filename() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("V2__items.sql"), "CREATE TABLE items (id INTEGER);").unwrap();
        std::fs::write(dir.path().join("V1__init.sql"), "CREATE TABLE t (id INTEGER);").unwrap();
        std::fs::write(dir.path().join("README.md"), "not a migration").unwrap();

        let migrations = resolve(Some(&MigrationSource::from_dir(dir.path())))
            .await
            .unwrap();
        let names: Vec<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["V1__init", "V2__items"]);
        assert_eq!(migrations[1].sql, "CREATE TABLE items (id INTEGER);");
    }

    #[tokio::test]
    async fn from_missing_dir_is_resolution_error() {
        let err = resolve(Some(&MigrationSource::from_dir("/nonexistent-sqlkeep-migrations")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Resolution { .. }));
    }
}
