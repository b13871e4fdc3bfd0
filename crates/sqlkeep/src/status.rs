// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sqlkeep status` command implementation.
//!
//! Reports where the live database file is, how big it is, and which
//! migrations its ledger records. Does not create the database: a missing file
//! is reported as such. Inspecting an existing file opens it, which applies
//! any pending migrations first.

use std::io::IsTerminal;
use std::path::Path;

use serde::Serialize;
use sqlkeep_config::SqlkeepConfig;
use sqlkeep_core::{ClientError, ExecMode, SqlValue};
use sqlkeep_storage::{DbClient, LEDGER_TABLE};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database: String,
    pub path: String,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub journal_mode: Option<String>,
    pub applied_migrations: Vec<String>,
}

/// Names recorded in the migration ledger, in application order. Empty if the
/// ledger has not been created yet.
pub async fn applied_migrations(client: &DbClient) -> Result<Vec<String>, ClientError> {
    let present = client
        .exec(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[SqlValue::from(LEDGER_TABLE)],
            ExecMode::Rows,
        )
        .await?;
    if present.first().and_then(|row| row.first()) != Some(&SqlValue::Integer(1)) {
        return Ok(Vec::new());
    }

    let rows = client
        .exec(
            &format!("SELECT name FROM {LEDGER_TABLE} ORDER BY id"),
            &[],
            ExecMode::Rows,
        )
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter_map(|value| value.as_text().map(str::to_string))
        .collect())
}

/// Run the `sqlkeep status` command.
pub async fn run_status(
    client: &DbClient,
    config: &SqlkeepConfig,
    json: bool,
    plain: bool,
) -> Result<(), ClientError> {
    let database = client.database_name();
    let filename = client.names().live_filename(&database)?;
    let path = Path::new(&config.database.directory).join(filename);
    let size_bytes = tokio::fs::metadata(&path).await.ok().map(|m| m.len());

    let mut status = StatusResponse {
        database,
        path: path.display().to_string(),
        exists: size_bytes.is_some(),
        size_bytes,
        journal_mode: None,
        applied_migrations: Vec::new(),
    };

    if status.exists {
        status.applied_migrations = applied_migrations(client).await?;
        status.journal_mode = client
            .exec("PRAGMA journal_mode", &[], ExecMode::Rows)
            .await?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .and_then(|value| value.as_text().map(str::to_string));
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  sqlkeep status");
    println!("  {}", "-".repeat(35));
    println!("    Database: {}", status.database);
    println!("    Path:     {}", status.path);

    match status.size_bytes {
        Some(size) => {
            if use_color {
                use colored::Colorize;
                println!("    State:    {} {}", "✓".green(), format_size(size).green());
            } else {
                println!("    State:    [OK] {}", format_size(size));
            }
            if let Some(mode) = &status.journal_mode {
                println!("    Journal:  {mode}");
            }
            println!("    Migrations applied: {}", status.applied_migrations.len());
            for name in &status.applied_migrations {
                println!("      {name}");
            }
        }
        None => {
            if use_color {
                use colored::Colorize;
                println!("    State:    {} {}", "✗".red(), "not created".red());
            } else {
                println!("    State:    [MISSING] not created");
            }
            println!();
            println!("  Create with: sqlkeep migrate");
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn status_response_serializes() {
        let resp = StatusResponse {
            database: "shop".to_string(),
            path: "/data/shop.sqlite3".to_string(),
            exists: true,
            size_bytes: Some(4096),
            journal_mode: Some("wal".to_string()),
            applied_migrations: vec!["0001_init".to_string()],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"exists\":true"));
        assert!(json.contains("\"applied_migrations\":[\"0001_init\"]"));
    }
}
