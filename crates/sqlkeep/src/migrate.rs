// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sqlkeep migrate` command implementation.

use sqlkeep_core::ClientError;
use sqlkeep_storage::DbClient;

use crate::status::applied_migrations;

/// Opens the database, which applies every pending migration, then lists the
/// ledger.
pub async fn run_migrate(client: &DbClient) -> Result<(), ClientError> {
    if client.config().migrations.is_none() {
        eprintln!("sqlkeep: no migrations configured (set migrations.directory)");
    }
    let handle = client.open_db().await?;
    let applied = applied_migrations(client).await?;

    println!("{}: {} migration(s) applied", handle.database_name, applied.len());
    for name in &applied {
        println!("  {name}");
    }
    Ok(())
}
