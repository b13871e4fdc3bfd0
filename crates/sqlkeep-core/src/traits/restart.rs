// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Restart trait invoked once at the end of a restore.

use async_trait::async_trait;

use crate::error::ClientError;

/// Full re-initialization of the embedding process.
///
/// After a restore every in-memory view of the old database is stale, so the
/// implementation must arrange for all state to be rebuilt against the new file.
#[async_trait]
pub trait Restart: Send + Sync {
    async fn restart(&self) -> Result<(), ClientError>;
}
