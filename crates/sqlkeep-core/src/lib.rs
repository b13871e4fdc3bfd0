// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the sqlkeep embedded-database client.
//!
//! This crate provides the collaborator traits (query executor, blob store,
//! delivery, restart), the shared error type, and the SQL value types used
//! throughout the workspace. Concrete implementations live in
//! `sqlkeep-storage`.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{BoxError, ClientError};
pub use types::{ExecMode, Row, SessionId, SqlValue};

pub use traits::{BlobStore, Delivery, QueryExecutor, Restart};
