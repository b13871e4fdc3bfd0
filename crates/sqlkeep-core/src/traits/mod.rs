// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions consumed by the client.
//!
//! All traits use `#[async_trait]` so they can be held as trait objects.

pub mod blob;
pub mod delivery;
pub mod executor;
pub mod restart;

pub use blob::BlobStore;
pub use delivery::Delivery;
pub use executor::QueryExecutor;
pub use restart::Restart;
