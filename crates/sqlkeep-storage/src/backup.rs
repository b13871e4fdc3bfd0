// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Online backup and restore.
//!
//! Backup snapshots the live database with `VACUUM INTO`, which produces a
//! consistent copy even while the database is being written to in WAL mode.
//! The artifact is read back, handed to the delivery collaborator, and deleted.
//!
//! Restore closes the client, replaces the live database file, removes stale
//! WAL sidecars, and asks for a restart so nothing keeps pages of the old file.

use tracing::{debug, info, warn};

use sqlkeep_core::{BlobStore, ClientError, Delivery, Restart};

use crate::client::DbClient;
use crate::names::{self, sidecar_filenames};

/// Result of a successful backup.
#[derive(Debug)]
pub struct BackupArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Set when the transient artifact could not be removed after delivery.
    /// The backup itself still succeeded.
    pub cleanup_error: Option<ClientError>,
}

/// Snapshots the client's database and delivers it as
/// `{name}.backup.{YYYY-MM-DD}.sqlite3`.
///
/// A same-day artifact left over from an earlier run is overwritten.
pub async fn backup_database(
    client: &DbClient,
    blobs: &dyn BlobStore,
    delivery: &dyn Delivery,
) -> Result<BackupArtifact, ClientError> {
    let handle = client.open_db().await?;
    let database_name = handle.database_name;
    let date = names::utc_today();
    let filename = client.names().backup_filename_on(&database_name, date)?;

    if blobs.exists(&filename).await? {
        debug!(artifact = %filename, "removing stale same-day artifact");
        blobs.delete_bytes(&filename).await?;
    }

    client.vacuum_into_on(&database_name, date).await?;
    let bytes = blobs.read_bytes(&filename).await?;
    delivery.deliver(&filename, &bytes).await?;

    let cleanup_error = match blobs.delete_bytes(&filename).await {
        Ok(()) => None,
        Err(e) => {
            warn!(artifact = %filename, error = %e, "failed to remove backup artifact");
            Some(ClientError::Cleanup {
                name: filename.clone(),
                source: Box::new(e),
            })
        }
    };

    info!(database = %database_name, artifact = %filename, size = bytes.len(), "backup complete");
    Ok(BackupArtifact {
        filename,
        bytes,
        cleanup_error,
    })
}

/// Replaces the live database of `target_database_name` with `bytes` and
/// triggers a restart.
///
/// The bytes are not checked; a corrupt upload fails on the next open. If
/// closing the client fails nothing is written.
pub async fn restore_database(
    client: &DbClient,
    blobs: &dyn BlobStore,
    restart: &dyn Restart,
    target_database_name: &str,
    bytes: &[u8],
) -> Result<(), ClientError> {
    let filename = client.names().live_filename(target_database_name)?;
    client.close().await?;

    blobs.write_bytes(&filename, bytes).await?;
    for sidecar in sidecar_filenames(&filename) {
        if blobs.exists(&sidecar).await? {
            debug!(sidecar = %sidecar, "removing stale journal");
            blobs.delete_bytes(&sidecar).await?;
        }
    }

    info!(database = target_database_name, size = bytes.len(), "database restored");
    restart.restart().await
}
