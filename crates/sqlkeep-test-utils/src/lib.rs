// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for sqlkeep integration tests.
//!
//! # Components
//!
//! - [`RecordingExecutor`] - wraps a real executor, counts opens and records
//!   statements, and can inject failures or slow opens
//! - [`MemoryBlobStore`] / [`FlakyBlobStore`] - in-memory store and a wrapper
//!   whose deletes fail
//! - [`RecordingDelivery`] / [`CountingRestart`] - capture what backup and
//!   restore hand to their collaborators

pub mod blob;
pub mod collaborators;
pub mod recording_executor;

pub use blob::{FlakyBlobStore, MemoryBlobStore};
pub use collaborators::{CountingRestart, RecordingDelivery};
pub use recording_executor::RecordingExecutor;
