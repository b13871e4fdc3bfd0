// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sqlkeep backup` and `sqlkeep restore` command implementation.
//!
//! Both operate on the database directory as a blob store: backup snapshots
//! into it and delivers the artifact to the output directory, restore writes
//! the uploaded file over the live database.

use std::path::Path;

use sqlkeep_config::SqlkeepConfig;
use sqlkeep_core::ClientError;
use sqlkeep_storage::{
    DbClient, DirectoryDelivery, FsBlobStore, SignalRestart, backup_database, restore_database,
};

/// Run a backup of the configured database into `output_dir`.
pub async fn run_backup(
    client: &DbClient,
    config: &SqlkeepConfig,
    output_dir: &Path,
) -> Result<(), ClientError> {
    let blobs = FsBlobStore::new(&config.database.directory);
    let delivery = DirectoryDelivery::new(output_dir);

    let artifact = backup_database(client, &blobs, &delivery).await?;
    if let Some(e) = &artifact.cleanup_error {
        eprintln!("sqlkeep: warning: {e}");
    }

    let size_mb = artifact.bytes.len() as f64 / (1024.0 * 1024.0);
    eprintln!(
        "Backup complete: {size_mb:.1} MB written to {}",
        delivery.destination(&artifact.filename).display()
    );
    Ok(())
}

/// Replace the configured database with the contents of `from`.
pub async fn run_restore(
    client: &DbClient,
    config: &SqlkeepConfig,
    from: &Path,
) -> Result<(), ClientError> {
    let bytes = tokio::fs::read(from)
        .await
        .map_err(|e| ClientError::blob(from.display().to_string(), e))?;
    let blobs = FsBlobStore::new(&config.database.directory);
    let restart = SignalRestart::new();

    let database = client.database_name();
    restore_database(client, &blobs, &restart, &database, &bytes).await?;

    // The process exits after this command, which is the restart.
    if restart.is_requested() {
        eprintln!("Restore complete: {database} replaced from {}", from.display());
    }
    Ok(())
}
