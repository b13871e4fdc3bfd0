// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`QueryExecutor`] trait.
//!
//! Every session is a `tokio-rusqlite` connection: statements are shipped as
//! closures over a channel to that connection's background thread, which runs
//! them one at a time. Calls on a session are therefore serialized.
//!
//! Closing a session stops its thread, so `release` keeps the trait's no-op
//! default and never touches sessions of other clients sharing the executor.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value;
use thiserror::Error;
use tracing::{debug, warn};

use sqlkeep_config::model::DatabaseConfig;
use sqlkeep_core::{ClientError, ExecMode, QueryExecutor, Row, SessionId, SqlValue};

/// Executor-local failures that have no rusqlite counterpart.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("unknown session `{0}`")]
    UnknownSession(SessionId),
}

/// Per-session connection settings.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Switch the journal to WAL on open and checkpoint it on close.
    pub wal_mode: bool,
    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&DatabaseConfig> for SqliteOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            wal_mode: config.wal_mode,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// SQLite-backed query executor.
///
/// URIs are opened with rusqlite's default flags, which enable URI filenames,
/// so `file:...?vfs=...` selects the VFS and `VACUUM INTO` accepts a URI target.
pub struct SqliteExecutor {
    options: SqliteOptions,
    sessions: Mutex<HashMap<SessionId, tokio_rusqlite::Connection>>,
}

impl SqliteExecutor {
    pub fn new(options: SqliteOptions) -> Self {
        Self {
            options,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.lock_sessions().len()
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, tokio_rusqlite::Connection>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connection(&self, session: &SessionId) -> Result<tokio_rusqlite::Connection, ClientError> {
        self.lock_sessions()
            .get(session)
            .cloned()
            .ok_or_else(|| ClientError::query(ExecutorError::UnknownSession(session.clone())))
    }

    async fn shutdown_connection(&self, session: &SessionId, conn: tokio_rusqlite::Connection) -> Result<(), ClientError> {
        if self.options.wal_mode {
            let checkpoint = conn
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await;
            if let Err(e) = checkpoint {
                warn!(session = %session, error = %e, "WAL checkpoint before close failed");
            }
        }
        conn.close().await.map_err(|e| ClientError::Close {
            source: Box::new(e),
        })?;
        debug!(session = %session, "session closed");
        Ok(())
    }

    /// Closes every session still open, whichever client owns it. For process
    /// teardown; clients sharing this executor lose their connections.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let drained: Vec<(SessionId, tokio_rusqlite::Connection)> =
            self.lock_sessions().drain().collect();
        let mut first_error = None;
        for (session, conn) in drained {
            if let Err(e) = self.shutdown_connection(&session, conn).await {
                warn!(session = %session, error = %e, "failed to close session during shutdown");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for SqliteExecutor {
    fn default() -> Self {
        Self::new(SqliteOptions::default())
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn open(&self, uri: &str) -> Result<SessionId, ClientError> {
        let conn = tokio_rusqlite::Connection::open(uri)
            .await
            .map_err(|e| ClientError::Connection {
                source: Box::new(e),
            })?;

        let wal_mode = self.options.wal_mode;
        let busy_timeout = self.options.busy_timeout;
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            if wal_mode {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
            }
            Ok(())
        })
        .await
        .map_err(|e| ClientError::Connection {
            source: Box::new(e),
        })?;

        let session = SessionId(uuid::Uuid::new_v4().to_string());
        self.lock_sessions().insert(session.clone(), conn);
        debug!(session = %session, uri, "session opened");
        Ok(session)
    }

    async fn exec(
        &self,
        session: &SessionId,
        sql: &str,
        params: &[SqlValue],
        mode: ExecMode,
    ) -> Result<Vec<Row>, ClientError> {
        let conn = self.connection(session)?;
        let sql = sql.to_string();
        let params: Vec<Value> = params.iter().map(to_sqlite).collect();

        conn.call(move |conn| -> Result<Vec<Row>, rusqlite::Error> {
            match mode {
                // execute_batch runs every statement in a multi-statement script.
                ExecMode::Discard if params.is_empty() => {
                    conn.execute_batch(&sql)?;
                    Ok(Vec::new())
                }
                ExecMode::Discard => {
                    let mut stmt = conn.prepare(&sql)?;
                    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
                    while rows.next()?.is_some() {}
                    Ok(Vec::new())
                }
                ExecMode::Rows => {
                    let mut stmt = conn.prepare(&sql)?;
                    let columns = stmt.column_count();
                    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
                    let mut out = Vec::new();
                    while let Some(row) = rows.next()? {
                        let mut values = Vec::with_capacity(columns);
                        for i in 0..columns {
                            values.push(from_sqlite(row.get::<_, Value>(i)?));
                        }
                        out.push(values);
                    }
                    Ok(out)
                }
            }
        })
        .await
        .map_err(ClientError::query)
    }

    async fn close(&self, session: &SessionId) -> Result<(), ClientError> {
        let conn = self.lock_sessions().remove(session);
        match conn {
            Some(conn) => self.shutdown_connection(session, conn).await,
            None => {
                debug!(session = %session, "close requested for unknown session");
                Ok(())
            }
        }
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Real(f) => SqlValue::Real(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::names::NameScheme;

    async fn open_temp(executor: &SqliteExecutor, dir: &std::path::Path) -> SessionId {
        let uri = NameScheme::native(dir).live_uri("exec_test").unwrap();
        executor.open(&uri).await.unwrap()
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempdir().unwrap();
        let executor = SqliteExecutor::default();
        let session = open_temp(&executor, dir.path()).await;

        assert!(dir.path().join("exec_test.sqlite3").exists());
        assert_eq!(executor.open_sessions(), 1);
        executor.close(&session).await.unwrap();
        assert_eq!(executor.open_sessions(), 0);
    }

    #[tokio::test]
    async fn rows_mode_returns_typed_values() {
        let dir = tempdir().unwrap();
        let executor = SqliteExecutor::default();
        let session = open_temp(&executor, dir.path()).await;

        executor
            .exec(
                &session,
                "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT, weight REAL, data BLOB);
                 INSERT INTO items VALUES (1, 'bolt', 0.5, x'0102');",
                &[],
                ExecMode::Discard,
            )
            .await
            .unwrap();
        executor
            .exec(
                &session,
                "INSERT INTO items (id, label) VALUES (?, ?)",
                &[SqlValue::Integer(2), SqlValue::from("nut")],
                ExecMode::Discard,
            )
            .await
            .unwrap();

        let rows = executor
            .exec(
                &session,
                "SELECT id, label, weight, data FROM items WHERE id >= ? ORDER BY id",
                &[SqlValue::Integer(1)],
                ExecMode::Rows,
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![
                SqlValue::Integer(1),
                SqlValue::Text("bolt".into()),
                SqlValue::Real(0.5),
                SqlValue::Blob(vec![1, 2]),
            ]
        );
        assert_eq!(rows[1][1], SqlValue::Text("nut".into()));
        assert_eq!(rows[1][2], SqlValue::Null);
    }

    #[tokio::test]
    async fn discard_mode_returns_no_rows() {
        let dir = tempdir().unwrap();
        let executor = SqliteExecutor::default();
        let session = open_temp(&executor, dir.path()).await;

        let rows = executor
            .exec(&session, "SELECT 1", &[], ExecMode::Discard)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn exec_on_unknown_session_fails() {
        let executor = SqliteExecutor::default();
        let err = executor
            .exec(&SessionId("missing".into()), "SELECT 1", &[], ExecMode::Rows)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Query { .. }));
        assert!(err.to_string().contains("unknown session"));
    }

    #[tokio::test]
    async fn open_in_missing_directory_is_connection_error() {
        let executor = SqliteExecutor::default();
        let err = executor
            .open("file:/nonexistent-sqlkeep-dir/x.sqlite3")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));
    }

    #[tokio::test]
    async fn shutdown_closes_every_session() {
        let dir = tempdir().unwrap();
        let executor = SqliteExecutor::default();
        let uri = NameScheme::native(dir.path()).live_uri("a").unwrap();
        executor.open(&uri).await.unwrap();
        executor.open(&uri).await.unwrap();
        assert_eq!(executor.open_sessions(), 2);

        executor.shutdown().await.unwrap();
        assert_eq!(executor.open_sessions(), 0);
        // Idempotent.
        executor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn release_leaves_sessions_open() {
        let dir = tempdir().unwrap();
        let executor = SqliteExecutor::default();
        let session = open_temp(&executor, dir.path()).await;

        executor.release().await.unwrap();
        assert_eq!(executor.open_sessions(), 1);
        executor
            .exec(&session, "SELECT 1", &[], ExecMode::Rows)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wal_mode_is_applied() {
        let dir = tempdir().unwrap();
        let executor = SqliteExecutor::default();
        let session = open_temp(&executor, dir.path()).await;

        let rows = executor
            .exec(&session, "PRAGMA journal_mode", &[], ExecMode::Rows)
            .await
            .unwrap();
        assert_eq!(rows[0][0], SqlValue::Text("wal".into()));
    }
}
