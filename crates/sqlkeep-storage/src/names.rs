// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical resource names derived from a logical database name.
//!
//! Live database: `{escaped}.sqlite3`, opened through the URI
//! `file:{root/}{escaped}.sqlite3{?vfs=...}`. Single quotes in the logical name
//! are doubled in the live names only.
//!
//! Backup artifact: `{name}.backup.{YYYY-MM-DD}.sqlite3`, stamped with the UTC
//! date. Two backups of the same database on the same day share a name.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use sqlkeep_config::model::DatabaseConfig;
use sqlkeep_core::ClientError;

const EXTENSION: &str = "sqlite3";

/// Naming scheme for live databases and backup artifacts.
///
/// `root` anchors URIs in a directory (blob names stay relative to it);
/// `vfs` selects the SQLite storage subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameScheme {
    root: Option<String>,
    vfs: Option<String>,
}

impl NameScheme {
    /// The browser layout: no root directory, `?vfs=opfs` on every URI.
    pub fn opfs() -> Self {
        Self {
            root: None,
            vfs: Some("opfs".to_string()),
        }
    }

    /// Files under `dir`, opened with the default VFS.
    pub fn native(dir: impl AsRef<Path>) -> Self {
        Self {
            root: Some(dir.as_ref().to_string_lossy().into_owned()),
            vfs: None,
        }
    }

    /// Scheme for the `[database]` settings: files under `directory`, with the
    /// configured VFS if any.
    pub fn from_settings(config: &DatabaseConfig) -> Self {
        let scheme = Self::native(&config.directory);
        match &config.vfs {
            Some(vfs) => scheme.with_vfs(vfs.clone()),
            None => scheme,
        }
    }

    /// Selects a VFS for every URI this scheme produces.
    pub fn with_vfs(mut self, vfs: impl Into<String>) -> Self {
        self.vfs = Some(vfs.into());
        self
    }

    /// Filename of the live database, e.g. `shop.sqlite3`.
    pub fn live_filename(&self, database_name: &str) -> Result<String, ClientError> {
        validate(database_name)?;
        Ok(format!("{}.{EXTENSION}", escape_name(database_name)))
    }

    /// URI the executor opens for the live database.
    pub fn live_uri(&self, database_name: &str) -> Result<String, ClientError> {
        let filename = self.live_filename(database_name)?;
        Ok(self.uri(&filename))
    }

    /// Filename of today's backup artifact (UTC).
    pub fn backup_filename(&self, database_name: &str) -> Result<String, ClientError> {
        self.backup_filename_on(database_name, utc_today())
    }

    /// Filename of the backup artifact stamped with `date`.
    pub fn backup_filename_on(
        &self,
        database_name: &str,
        date: NaiveDate,
    ) -> Result<String, ClientError> {
        validate(database_name)?;
        Ok(format!(
            "{database_name}.backup.{}.{EXTENSION}",
            date.format("%Y-%m-%d")
        ))
    }

    /// URI the snapshot statement writes today's backup artifact to.
    pub fn backup_uri(&self, database_name: &str) -> Result<String, ClientError> {
        self.backup_uri_on(database_name, utc_today())
    }

    /// URI of the backup artifact stamped with `date`.
    pub fn backup_uri_on(
        &self,
        database_name: &str,
        date: NaiveDate,
    ) -> Result<String, ClientError> {
        let filename = self.backup_filename_on(database_name, date)?;
        Ok(self.uri(&filename))
    }

    fn uri(&self, filename: &str) -> String {
        let mut uri = String::from("file:");
        if let Some(root) = &self.root {
            // '%' would start an escape sequence inside a SQLite URI.
            uri.push_str(&root.replace('%', "%25"));
            if !root.ends_with('/') {
                uri.push('/');
            }
        }
        uri.push_str(filename);
        if let Some(vfs) = &self.vfs {
            uri.push_str("?vfs=");
            uri.push_str(vfs);
        }
        uri
    }
}

/// Doubles single quotes, as in an SQL string literal.
pub fn escape_name(database_name: &str) -> String {
    database_name.replace('\'', "''")
}

/// Journal files SQLite may keep next to `filename`.
pub fn sidecar_filenames(filename: &str) -> [String; 2] {
    [format!("{filename}-wal"), format!("{filename}-shm")]
}

/// Today's date in UTC, the stamp used for backup names.
pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

fn validate(database_name: &str) -> Result<(), ClientError> {
    if database_name.is_empty() {
        return Err(ClientError::Config(
            "database name must not be empty".to_string(),
        ));
    }
    Ok(())
}
