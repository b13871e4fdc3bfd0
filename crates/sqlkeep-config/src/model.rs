// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the sqlkeep client.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level sqlkeep configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SqlkeepConfig {
    /// Managed database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Where migration files are loaded from.
    #[serde(default)]
    pub migrations: MigrationsConfig,

    /// Backup delivery settings.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Managed database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Logical database name. Used as the file stem of the live database.
    #[serde(default = "default_database_name")]
    pub name: String,

    /// Directory holding the live database and transient backup artifacts.
    #[serde(default = "default_directory")]
    pub directory: String,

    /// SQLite VFS to request in the connection URI. `None` uses the default VFS.
    #[serde(default)]
    pub vfs: Option<String>,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long SQLite waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Upper bound on one open sequence (connect plus migrations). Unbounded when unset.
    #[serde(default)]
    pub open_timeout_secs: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_database_name(),
            directory: default_directory(),
            vfs: None,
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
            open_timeout_secs: None,
        }
    }
}

fn default_database_name() -> String {
    "app".to_string()
}

fn default_directory() -> String {
    dirs::data_dir()
        .map(|p| p.join("sqlkeep"))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Migration source configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsConfig {
    /// Directory of `*.sql` files applied in filename order. `None` means no migrations.
    #[serde(default)]
    pub directory: Option<String>,
}

/// Backup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Directory that finished backups are delivered into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    ".".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Log level filter for the `sqlkeep` targets (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
