// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the sqlkeep client.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error carried as the `source` of most variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type returned by every client, executor, and blob store operation.
///
/// Collaborator errors are never interpreted or retried; they are boxed into the
/// variant describing where they happened and propagated verbatim.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid client configuration (empty database name, bad directory).
    #[error("configuration error: {0}")]
    Config(String),

    /// The migration source producer failed. The database was not touched.
    #[error("failed to resolve migrations: {source}")]
    Resolution { source: BoxError },

    /// A migration's statements failed and its transaction was rolled back.
    #[error("migration `{name}` failed: {source}")]
    Migration { name: String, source: BoxError },

    /// The executor could not open a session.
    #[error("connection error: {source}")]
    Connection { source: BoxError },

    /// A statement failed outside of migration application.
    #[error("query error: {source}")]
    Query { source: BoxError },

    /// Blob store read, write, or delete failure.
    #[error("blob `{name}`: {source}")]
    Blob { name: String, source: BoxError },

    /// The delivery collaborator could not hand the backup over.
    #[error("failed to deliver `{filename}`: {source}")]
    Delivery { filename: String, source: BoxError },

    /// A transient backup artifact could not be removed after delivery.
    #[error("failed to clean up backup artifact `{name}`: {source}")]
    Cleanup { name: String, source: BoxError },

    /// Closing the executor session failed. The handle has been cleared anyway.
    #[error("failed to close session: {source}")]
    Close { source: BoxError },

    /// The restart collaborator failed.
    #[error("restart failed: {source}")]
    Restart { source: BoxError },

    /// A bounded wait elapsed.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Failure of a single-flight open, shared by every caller that joined it.
    #[error(transparent)]
    Shared(Arc<ClientError>),
}

impl ClientError {
    /// Returns the underlying error, looking through [`ClientError::Shared`].
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Wraps an executor failure that happened while running a statement.
    pub fn query(source: impl Into<BoxError>) -> Self {
        ClientError::Query {
            source: source.into(),
        }
    }

    /// Wraps a blob store failure for the named blob.
    pub fn blob(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ClientError::Blob {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Convenience alias used across the workspace.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
