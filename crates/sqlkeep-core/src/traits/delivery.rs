// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery trait: hands a finished backup to the operator.

use async_trait::async_trait;

use crate::error::ClientError;

/// Presents `(filename, bytes)` to a human as a retrievable file.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<(), ClientError>;
}
