// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as a usable database name, non-empty directories, and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::SqlkeepConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SqlkeepConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let name = &config.database.name;
    if name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "database.name must not be empty".to_string(),
        });
    } else if name.contains(['/', '\\', '\0']) {
        errors.push(ConfigError::Validation {
            message: format!(
                "database.name `{name}` is used as a file stem and must not contain path separators"
            ),
        });
    }

    if config.database.directory.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "database.directory must not be empty".to_string(),
        });
    }

    if config.database.directory.contains(['?', '#']) {
        errors.push(ConfigError::Validation {
            message: format!(
                "database.directory `{}` must not contain `?` or `#` (it is embedded in a URI)",
                config.database.directory
            ),
        });
    }

    if let Some(vfs) = &config.database.vfs {
        if vfs.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "database.vfs must not be empty when set".to_string(),
            });
        }
    }

    if config.database.open_timeout_secs == Some(0) {
        errors.push(ConfigError::Validation {
            message: "database.open_timeout_secs must be greater than zero".to_string(),
        });
    }

    if let Some(dir) = &config.migrations.directory {
        if dir.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "migrations.directory must not be empty when set".to_string(),
            });
        }
    }

    if config.backup.output_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "backup.output_dir must not be empty".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
