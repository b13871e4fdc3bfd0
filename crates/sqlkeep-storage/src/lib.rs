// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection lifecycle, migrations, and backup/restore for sqlkeep.
//!
//! [`DbClient`] owns one logical connection with single-flight open and
//! applies pending [`Migration`]s before publishing it. [`backup_database`]
//! and [`restore_database`] drive the snapshot and replace workflows through
//! the blob store, delivery and restart collaborators, whose native
//! implementations live here too.

pub mod backup;
pub mod blob;
pub mod client;
pub mod delivery;
pub mod executor;
pub mod migrations;
pub mod names;
pub mod restart;

pub use backup::{BackupArtifact, backup_database, restore_database};
pub use blob::FsBlobStore;
pub use client::{ClientConfig, ConnectionHandle, DbClient};
pub use delivery::DirectoryDelivery;
pub use executor::{SqliteExecutor, SqliteOptions};
pub use migrations::{LEDGER_TABLE, Migration, MigrationSource};
pub use names::NameScheme;
pub use restart::SignalRestart;
