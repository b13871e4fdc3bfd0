// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sqlkeep.toml` > `~/.config/sqlkeep/sqlkeep.toml` > `/etc/sqlkeep/sqlkeep.toml`
//! with environment variable overrides via `SQLKEEP_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SqlkeepConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sqlkeep/sqlkeep.toml` (system-wide)
/// 3. `~/.config/sqlkeep/sqlkeep.toml` (user XDG config)
/// 4. `./sqlkeep.toml` (local directory)
/// 5. `SQLKEEP_*` environment variables
pub fn load_config() -> Result<SqlkeepConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
pub fn load_config_from_str(toml_content: &str) -> Result<SqlkeepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SqlkeepConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SqlkeepConfig, figment::Error> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
    }
    Figment::new()
        .merge(Serialized::defaults(SqlkeepConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for XDG config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SqlkeepConfig::default()))
        .merge(Toml::file("/etc/sqlkeep/sqlkeep.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sqlkeep/sqlkeep.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sqlkeep.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `SQLKEEP_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `SQLKEEP_DATABASE_BUSY_TIMEOUT_MS` must map to
/// `database.busy_timeout_ms`.
fn env_provider() -> Env {
    Env::prefixed("SQLKEEP_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("database_", "database.", 1)
            .replacen("migrations_", "migrations.", 1)
            .replacen("backup_", "backup.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}
