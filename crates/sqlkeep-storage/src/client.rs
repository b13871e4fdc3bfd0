// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The connection manager: one logical connection per client.
//!
//! A client is `Idle`, `Opening` or `Open`. The first caller of
//! [`DbClient::open_db`] starts the open sequence (resolve migrations, open a
//! session, apply migrations) as a shared future; every concurrent caller joins
//! it and observes the same handle or the same error. A handle is published only
//! after every outstanding migration has committed.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use sqlkeep_config::SqlkeepConfig;
use sqlkeep_core::{ClientError, ExecMode, QueryExecutor, Row, SessionId, SqlValue};

use crate::executor::{SqliteExecutor, SqliteOptions};
use crate::migrations::{self, MigrationSource};
use crate::names::{self, NameScheme};

/// What a client opens. Replaced only through [`DbClient::switch_db`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub database_name: String,
    pub migrations: Option<MigrationSource>,
    /// Deadline for the whole open sequence. `None` waits indefinitely.
    pub open_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            migrations: None,
            open_timeout: None,
        }
    }

    pub fn with_migrations(mut self, source: impl Into<MigrationSource>) -> Self {
        self.migrations = Some(source.into());
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = Some(timeout);
        self
    }

    /// Builds the client config from loaded settings. A relative migrations
    /// directory is taken relative to `base`.
    pub fn from_settings(settings: &SqlkeepConfig, base: &Path) -> Self {
        let mut config = Self::new(settings.database.name.clone());
        if let Some(dir) = &settings.migrations.directory {
            config.migrations = Some(MigrationSource::from_dir(base.join(dir)));
        }
        config.open_timeout = settings.database.open_timeout_secs.map(Duration::from_secs);
        config
    }
}

/// The published connection. Clones are only valid until the next `close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub session: SessionId,
    pub database_name: String,
}

type OpenFuture = Shared<BoxFuture<'static, Result<ConnectionHandle, Arc<ClientError>>>>;

enum ConnectionState {
    Idle,
    Opening { generation: u64, future: OpenFuture },
    Open(ConnectionHandle),
}

struct Inner {
    state: ConnectionState,
    config: Arc<ClientConfig>,
    generation: u64,
}

/// Client owning a single logical connection to one SQLite database.
pub struct DbClient {
    executor: Arc<dyn QueryExecutor>,
    names: NameScheme,
    inner: Mutex<Inner>,
}

impl DbClient {
    pub fn new(executor: Arc<dyn QueryExecutor>, names: NameScheme, config: ClientConfig) -> Self {
        Self {
            executor,
            names,
            inner: Mutex::new(Inner {
                state: ConnectionState::Idle,
                config: Arc::new(config),
                generation: 0,
            }),
        }
    }

    /// A client over a [`SqliteExecutor`] configured from loaded settings.
    pub fn from_settings(settings: &SqlkeepConfig, base: &Path) -> Self {
        let executor = SqliteExecutor::new(SqliteOptions::from(&settings.database));
        Self::new(
            Arc::new(executor),
            NameScheme::from_settings(&settings.database),
            ClientConfig::from_settings(settings, base),
        )
    }

    pub fn names(&self) -> &NameScheme {
        &self.names
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    /// Logical name of the database this client currently targets.
    pub fn database_name(&self) -> String {
        self.lock().config.database_name.clone()
    }

    pub fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.lock().config)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.lock().state, ConnectionState::Open(_))
    }

    /// Returns the published handle, joining or starting the open sequence.
    pub async fn open_db(&self) -> Result<ConnectionHandle, ClientError> {
        let (generation, future) = {
            let mut inner = self.lock();
            let existing = match &inner.state {
                ConnectionState::Open(handle) => return Ok(handle.clone()),
                ConnectionState::Opening { generation, future } => {
                    Some((*generation, future.clone()))
                }
                ConnectionState::Idle => None,
            };
            match existing {
                Some(joined) => joined,
                None => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let future = open_sequence(
                        Arc::clone(&self.executor),
                        self.names.clone(),
                        Arc::clone(&inner.config),
                    )
                    .boxed()
                    .shared();
                    inner.state = ConnectionState::Opening {
                        generation,
                        future: future.clone(),
                    };
                    (generation, future)
                }
            }
        };

        let outcome = future.await;
        self.settle(generation, &outcome);
        outcome.map_err(ClientError::Shared)
    }

    /// Runs `sql` on the open connection, opening it first if needed.
    pub async fn exec(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: ExecMode,
    ) -> Result<Vec<Row>, ClientError> {
        let handle = self.open_db().await?;
        self.executor.exec(&handle.session, sql, params, mode).await
    }

    /// Closes the connection and releases the executor. Safe to call at any time.
    ///
    /// An in-flight open is awaited first; its failure is ignored. The state is
    /// `Idle` on return even when the session close fails.
    pub async fn close(&self) -> Result<(), ClientError> {
        let handle = loop {
            let (generation, future) = {
                let mut inner = self.lock();
                let in_flight = match &inner.state {
                    ConnectionState::Opening { generation, future } => {
                        Some((*generation, future.clone()))
                    }
                    _ => None,
                };
                match in_flight {
                    Some(pending) => pending,
                    None => match std::mem::replace(&mut inner.state, ConnectionState::Idle) {
                        ConnectionState::Open(handle) => break Some(handle),
                        _ => break None,
                    },
                }
            };
            let outcome = future.await;
            self.settle(generation, &outcome);
        };

        let closed = match &handle {
            Some(handle) => {
                debug!(session = %handle.session, database = %handle.database_name, "closing session");
                self.executor
                    .close(&handle.session)
                    .await
                    .map_err(|e| match e {
                        ClientError::Close { .. } => e,
                        other => ClientError::Close {
                            source: Box::new(other),
                        },
                    })
            }
            None => Ok(()),
        };
        let released = self.executor.release().await;
        closed?;
        released
    }

    /// Closes the current connection and targets `config` from now on.
    ///
    /// The new config is adopted even if closing failed; that error is then
    /// returned. Nothing is opened until the next call that needs a connection.
    pub async fn switch_db(&self, config: ClientConfig) -> Result<(), ClientError> {
        let closed = self.close().await;
        debug!(database = %config.database_name, "switching database");
        self.lock().config = Arc::new(config);
        closed
    }

    /// Snapshots the live database into today's backup artifact of `target`.
    pub async fn vacuum_into(&self, target: &str) -> Result<(), ClientError> {
        self.vacuum_into_on(target, names::utc_today()).await
    }

    /// Snapshots the live database into the backup artifact of `target` stamped
    /// with `date`. The artifact must not already exist.
    pub async fn vacuum_into_on(&self, target: &str, date: NaiveDate) -> Result<(), ClientError> {
        let uri = self.names.backup_uri_on(target, date)?;
        let handle = self.open_db().await?;
        debug!(database = %handle.database_name, target = %uri, "vacuum into");
        self.executor
            .exec(
                &handle.session,
                "VACUUM INTO ?",
                &[SqlValue::Text(uri)],
                ExecMode::Discard,
            )
            .await?;
        Ok(())
    }

    /// Publishes or discards the outcome of open `generation`, unless a
    /// `close` or a newer open already replaced it.
    fn settle(&self, generation: u64, outcome: &Result<ConnectionHandle, Arc<ClientError>>) {
        let mut inner = self.lock();
        let current = matches!(
            &inner.state,
            ConnectionState::Opening { generation: g, .. } if *g == generation
        );
        if current {
            inner.state = match outcome {
                Ok(handle) => ConnectionState::Open(handle.clone()),
                Err(_) => ConnectionState::Idle,
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn open_sequence(
    executor: Arc<dyn QueryExecutor>,
    names: NameScheme,
    config: Arc<ClientConfig>,
) -> Result<ConnectionHandle, Arc<ClientError>> {
    let deadline = config
        .open_timeout
        .map(|duration| (Instant::now() + duration, duration));
    run_open(executor.as_ref(), &names, &config, deadline)
        .await
        .map_err(|e| {
            warn!(database = %config.database_name, error = %e, "open failed");
            Arc::new(e)
        })
}

async fn run_open(
    executor: &dyn QueryExecutor,
    names: &NameScheme,
    config: &ClientConfig,
    deadline: Option<(Instant, Duration)>,
) -> Result<ConnectionHandle, ClientError> {
    let pending = within(deadline, migrations::resolve(config.migrations.as_ref())).await?;
    let uri = names.live_uri(&config.database_name)?;
    let session = within(deadline, executor.open(&uri)).await?;

    if !pending.is_empty() {
        let applied = within(deadline, migrations::apply(executor, &session, &pending)).await;
        match applied {
            Ok(count) => debug!(database = %config.database_name, applied = count, "migrations up to date"),
            Err(e) => {
                if let Err(close) = executor.close(&session).await {
                    warn!(session = %session, error = %close, "failed to close session after failed open");
                }
                return Err(e);
            }
        }
    }

    debug!(database = %config.database_name, session = %session, "connection published");
    Ok(ConnectionHandle {
        session,
        database_name: config.database_name.clone(),
    })
}

async fn within<T>(
    deadline: Option<(Instant, Duration)>,
    step: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    match deadline {
        None => step.await,
        Some((at, duration)) => tokio::time::timeout_at(at, step)
            .await
            .map_err(|_| ClientError::Timeout { duration })?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sqlkeep_test_utils::RecordingExecutor;
    use tempfile::{TempDir, tempdir};

    use crate::migrations::{LEDGER_TABLE, Migration};

    struct Fixture {
        dir: TempDir,
        executor: Arc<RecordingExecutor<SqliteExecutor>>,
        client: DbClient,
    }

    fn fixture(config: ClientConfig) -> Fixture {
        let dir = tempdir().unwrap();
        let executor = Arc::new(RecordingExecutor::new(SqliteExecutor::default()));
        let client = DbClient::new(executor.clone(), NameScheme::native(dir.path()), config);
        Fixture {
            dir,
            executor,
            client,
        }
    }

    fn init_migrations() -> Vec<Migration> {
        vec![
            Migration::new("0001_init", "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);"),
            Migration::new("0002_seed", "INSERT INTO t (v) VALUES ('a'); INSERT INTO t (v) VALUES ('b');"),
        ]
    }

    #[tokio::test]
    async fn concurrent_opens_share_one_session() {
        let f = fixture(ClientConfig::new("shop").with_migrations(init_migrations()));
        let client = &f.client;

        let (a, b, c) = tokio::join!(client.open_db(), client.open_db(), client.open_db());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(f.executor.open_count(), 1);
        assert!(client.is_open());

        let rows = client
            .exec("SELECT count(*) FROM t", &[], ExecMode::Rows)
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Integer(2)]]);
        assert_eq!(f.executor.open_count(), 1);

        let statements = f.executor.statements();
        let count = |sql: &str| statements.iter().filter(|s| s.as_str() == sql).count();
        assert_eq!(
            statements
                .iter()
                .filter(|s| s.starts_with("CREATE TABLE IF NOT EXISTS __drizzle_migrations"))
                .count(),
            1
        );
        assert_eq!(count("BEGIN"), 2);
        assert_eq!(count("COMMIT"), 2);
        assert_eq!(count(&init_migrations()[0].sql), 1);
    }

    #[tokio::test]
    async fn clients_sharing_an_executor_close_independently() {
        let dir = tempdir().unwrap();
        let executor = Arc::new(SqliteExecutor::default());
        let a = DbClient::new(executor.clone(), NameScheme::native(dir.path()), ClientConfig::new("a"));
        let b = DbClient::new(executor.clone(), NameScheme::native(dir.path()), ClientConfig::new("b"));
        a.open_db().await.unwrap();
        b.open_db().await.unwrap();
        assert_eq!(executor.open_sessions(), 2);

        a.close().await.unwrap();

        assert!(!a.is_open());
        assert!(b.is_open());
        assert_eq!(executor.open_sessions(), 1);
        let rows = b.exec("SELECT 1", &[], ExecMode::Rows).await.unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Integer(1)]]);

        b.close().await.unwrap();
        assert_eq!(executor.open_sessions(), 0);
    }

    #[tokio::test]
    async fn failed_session_close_still_clears_handle() {
        let f = fixture(ClientConfig::new("shop"));
        f.client.open_db().await.unwrap();
        f.executor.fail_closes(true);

        let err = f.client.close().await.unwrap_err();
        assert!(matches!(err, ClientError::Close { .. }));
        assert!(!f.client.is_open());
        assert_eq!(f.executor.release_count(), 1);

        // Nothing left to close.
        f.client.close().await.unwrap();
        assert_eq!(f.executor.close_count(), 1);
    }

    #[tokio::test]
    async fn switch_db_adopts_config_after_failed_close() {
        let f = fixture(ClientConfig::new("first"));
        f.client.open_db().await.unwrap();
        f.executor.fail_closes(true);

        let err = f.client.switch_db(ClientConfig::new("second")).await.unwrap_err();
        assert!(matches!(err, ClientError::Close { .. }));
        assert_eq!(f.client.database_name(), "second");
        assert!(!f.client.is_open());

        f.executor.clear_failures();
        let handle = f.client.open_db().await.unwrap();
        assert_eq!(handle.database_name, "second");
    }

    #[tokio::test]
    async fn exec_discard_returns_no_rows() {
        let f = fixture(ClientConfig::new("shop"));
        let rows = f
            .client
            .exec("CREATE TABLE x (a INTEGER)", &[], ExecMode::Discard)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn no_migrations_skips_ledger() {
        let f = fixture(ClientConfig::new("shop"));
        f.client.open_db().await.unwrap();
        assert!(f.executor.statements().is_empty());

        let rows = f
            .client
            .exec(
                "SELECT count(*) FROM sqlite_master WHERE name = ?",
                &[SqlValue::from(LEDGER_TABLE)],
                ExecMode::Rows,
            )
            .await
            .unwrap();
        assert_eq!(rows[0][0], SqlValue::Integer(0));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let f = fixture(ClientConfig::new("shop"));
        f.client.close().await.unwrap();

        f.client.open_db().await.unwrap();
        f.client.close().await.unwrap();
        f.client.close().await.unwrap();

        assert!(!f.client.is_open());
        assert_eq!(f.executor.close_count(), 1);
        assert_eq!(f.executor.release_count(), 3);
        assert_eq!(f.executor.inner().open_sessions(), 0);
    }

    #[tokio::test]
    async fn reopen_after_close_starts_new_session() {
        let f = fixture(ClientConfig::new("shop"));
        let first = f.client.open_db().await.unwrap();
        f.client.close().await.unwrap();
        let second = f.client.open_db().await.unwrap();

        assert_ne!(first.session, second.session);
        assert_eq!(f.executor.open_count(), 2);
    }

    #[tokio::test]
    async fn failed_migration_is_shared_and_retryable() {
        let f = fixture(ClientConfig::new("shop").with_migrations(init_migrations()));
        f.executor.fail_statements_containing("INSERT INTO t");

        let (a, b) = tokio::join!(f.client.open_db(), f.client.open_db());
        for err in [a.unwrap_err(), b.unwrap_err()] {
            assert!(matches!(err.root(), ClientError::Migration { name, .. } if name == "0002_seed"));
        }
        assert_eq!(f.executor.open_count(), 1);
        assert!(!f.client.is_open());
        // The failed open closed its own session.
        assert_eq!(f.executor.inner().open_sessions(), 0);

        f.executor.clear_failures();
        f.client.open_db().await.unwrap();
        let rows = f
            .client
            .exec("SELECT name FROM __drizzle_migrations ORDER BY id", &[], ExecMode::Rows)
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![SqlValue::from("0001_init")],
                vec![SqlValue::from("0002_seed")],
            ]
        );
    }

    #[tokio::test]
    async fn resolution_failure_never_opens_a_session() {
        let source = MigrationSource::producer(|| Err("manifest missing".into()));
        let f = fixture(ClientConfig::new("shop").with_migrations(source));

        let err = f.client.open_db().await.unwrap_err();
        assert!(matches!(err.root(), ClientError::Resolution { .. }));
        assert_eq!(f.executor.open_count(), 0);
    }

    #[tokio::test]
    async fn connection_failure_propagates() {
        let f = fixture(ClientConfig::new("shop"));
        f.executor.fail_opens(true);

        let err = f.client.exec("SELECT 1", &[], ExecMode::Rows).await.unwrap_err();
        assert!(matches!(err.root(), ClientError::Connection { .. }));

        f.executor.fail_opens(false);
        f.client.exec("SELECT 1", &[], ExecMode::Rows).await.unwrap();
    }

    #[tokio::test]
    async fn empty_database_name_is_config_error() {
        let f = fixture(ClientConfig::new(""));
        let err = f.client.open_db().await.unwrap_err();
        assert!(matches!(err.root(), ClientError::Config(_)));
    }

    #[tokio::test]
    async fn open_timeout_elapses_then_recovers() {
        let f = fixture(ClientConfig::new("shop").with_open_timeout(Duration::from_millis(50)));
        f.executor.set_open_delay(Some(Duration::from_millis(500)));

        let err = f.client.open_db().await.unwrap_err();
        assert!(matches!(err.root(), ClientError::Timeout { .. }));
        assert!(!f.client.is_open());

        f.executor.set_open_delay(None);
        f.client.open_db().await.unwrap();
        assert!(f.client.is_open());
    }

    #[tokio::test]
    async fn close_waits_for_in_flight_open() {
        let f = fixture(ClientConfig::new("shop"));
        f.executor.set_open_delay(Some(Duration::from_millis(100)));

        let (opened, closed) = tokio::join!(f.client.open_db(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.client.close().await
        });
        opened.unwrap();
        closed.unwrap();

        assert!(!f.client.is_open());
        assert_eq!(f.executor.close_count(), 1);
        assert_eq!(f.executor.inner().open_sessions(), 0);
    }

    #[tokio::test]
    async fn switch_db_targets_new_database_lazily() {
        let f = fixture(ClientConfig::new("first"));
        f.client
            .exec("CREATE TABLE only_in_first (a INTEGER)", &[], ExecMode::Discard)
            .await
            .unwrap();

        f.client.switch_db(ClientConfig::new("second")).await.unwrap();
        assert_eq!(f.client.database_name(), "second");
        assert!(!f.client.is_open());
        assert_eq!(f.executor.open_count(), 1);

        let handle = f.client.open_db().await.unwrap();
        assert_eq!(handle.database_name, "second");
        let rows = f
            .client
            .exec(
                "SELECT count(*) FROM sqlite_master WHERE name = 'only_in_first'",
                &[],
                ExecMode::Rows,
            )
            .await
            .unwrap();
        assert_eq!(rows[0][0], SqlValue::Integer(0));
    }

    #[tokio::test]
    async fn vacuum_into_writes_dated_artifact() {
        let f = fixture(ClientConfig::new("shop").with_migrations(init_migrations()));
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        f.client.vacuum_into_on("shop", date).await.unwrap();

        let artifact = f.dir.path().join("shop.backup.2024-03-07.sqlite3");
        assert!(artifact.exists());
        assert!(std::fs::metadata(artifact).unwrap().len() > 0);
    }
}
