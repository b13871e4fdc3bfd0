// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named-blob store trait used by backup and restore.

use async_trait::async_trait;

use crate::error::ClientError;

/// Byte storage addressed by the filenames the naming scheme produces.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads the full contents of `name`.
    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ClientError>;

    /// Writes `bytes` to `name`, replacing any existing contents.
    async fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), ClientError>;

    /// Deletes `name`.
    async fn delete_bytes(&self, name: &str) -> Result<(), ClientError>;

    /// Returns whether `name` exists.
    async fn exists(&self, name: &str) -> Result<bool, ClientError>;
}
