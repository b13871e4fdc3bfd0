// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query executor trait: the SQL engine behind the client.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{ExecMode, Row, SessionId, SqlValue};

/// Opaque asynchronous SQL executor.
///
/// A session is opened against a URI produced by the naming scheme and stays
/// valid until [`close`](QueryExecutor::close). Implementations may run the
/// engine on a worker thread; [`release`](QueryExecutor::release) tears that
/// transport down.
#[async_trait]
pub trait QueryExecutor: Send + Sync + 'static {
    /// Opens a session against the database at `uri`.
    async fn open(&self, uri: &str) -> Result<SessionId, ClientError>;

    /// Executes `sql` with positional `params`.
    ///
    /// With [`ExecMode::Rows`] every result row is returned; with
    /// [`ExecMode::Discard`] the returned vector is always empty.
    async fn exec(
        &self,
        session: &SessionId,
        sql: &str,
        params: &[SqlValue],
        mode: ExecMode,
    ) -> Result<Vec<Row>, ClientError>;

    /// Closes a session previously returned by [`open`](QueryExecutor::open).
    async fn close(&self, session: &SessionId) -> Result<(), ClientError>;

    /// Releases transport resources held by the executor. Idempotent.
    async fn release(&self) -> Result<(), ClientError> {
        Ok(())
    }
}
