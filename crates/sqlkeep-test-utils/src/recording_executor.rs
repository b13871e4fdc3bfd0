// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executor wrapper that observes and perturbs calls to a real executor.

use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use sqlkeep_core::{ClientError, ExecMode, QueryExecutor, Row, SessionId, SqlValue};

/// Delegates to `inner` while counting lifecycle calls and recording SQL.
pub struct RecordingExecutor<E> {
    inner: E,
    opens: AtomicUsize,
    closes: AtomicUsize,
    releases: AtomicUsize,
    statements: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
    fail_opens: AtomicBool,
    fail_closes: AtomicBool,
    open_delay: Mutex<Option<Duration>>,
}

impl<E: QueryExecutor> RecordingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            statements: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            fail_opens: AtomicBool::new(false),
            fail_closes: AtomicBool::new(false),
            open_delay: Mutex::new(None),
        }
    }

    /// Sleeps for `delay` before every open reaches the inner executor.
    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.set_open_delay(Some(delay));
        self
    }

    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.open_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Makes every statement containing `needle` fail without reaching the inner executor.
    pub fn fail_statements_containing(&self, needle: &str) {
        *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) = Some(needle.to_string());
    }

    /// Makes opens fail (`true`) or succeed again (`false`).
    pub fn fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// Makes closes report failure (`true`) after the inner session has been
    /// closed, or succeed again (`false`).
    pub fn fail_closes(&self, fail: bool) {
        self.fail_closes.store(fail, Ordering::SeqCst);
    }

    /// Removes any injected failure.
    pub fn clear_failures(&self) {
        *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.fail_opens(false);
        self.fail_closes(false);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Every statement passed to `exec`, in call order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear_statements(&self) {
        self.statements.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for RecordingExecutor<E> {
    async fn open(&self, uri: &str) -> Result<SessionId, ClientError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let delay = *self.open_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(ClientError::Connection {
                source: format!("injected open failure for {uri}").into(),
            });
        }
        self.inner.open(uri).await
    }

    async fn exec(
        &self,
        session: &SessionId,
        sql: &str,
        params: &[SqlValue],
        mode: ExecMode,
    ) -> Result<Vec<Row>, ClientError> {
        self.statements.lock().unwrap_or_else(PoisonError::into_inner).push(sql.to_string());
        let injected = self
            .fail_on
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .is_some_and(|needle| sql.contains(needle));
        if injected {
            return Err(ClientError::query(format!("injected failure: {sql}")));
        }
        self.inner.exec(session, sql, params, mode).await
    }

    async fn close(&self, session: &SessionId) -> Result<(), ClientError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close(session).await?;
        if self.fail_closes.load(Ordering::SeqCst) {
            return Err(ClientError::query(format!("injected close failure for {session}")));
        }
        Ok(())
    }

    async fn release(&self) -> Result<(), ClientError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release().await
    }
}
