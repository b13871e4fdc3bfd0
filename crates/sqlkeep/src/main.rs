// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! sqlkeep - migrate, query, back up and restore an embedded SQLite database.

mod backup;
mod migrate;
mod query;
mod status;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sqlkeep_config::SqlkeepConfig;
use sqlkeep_core::ClientError;
use sqlkeep_storage::DbClient;

/// sqlkeep - embedded SQLite client with migrations and backups.
#[derive(Parser, Debug)]
#[command(name = "sqlkeep", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Target this database instead of `database.name`.
    #[arg(long, short = 'd', global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the database and apply pending migrations.
    Migrate,
    /// Run one SQL statement.
    Query {
        sql: String,
        /// Positional parameter; repeat for each `?`.
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
        /// Execute without collecting rows.
        #[arg(long)]
        discard: bool,
        /// Print rows as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the database file and its applied migrations.
    ///
    /// An existing database is opened to read its ledger, which applies any
    /// pending migrations first.
    Status {
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Snapshot the database into the backup output directory.
    Backup {
        /// Overrides `backup.output_dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Replace the database with a backup file.
    Restore { from: PathBuf },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => sqlkeep_config::load_and_validate_path(path),
        None => sqlkeep_config::load_and_validate(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            sqlkeep_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    if let Some(name) = cli.database {
        config.database.name = name;
    }

    init_tracing(&config.log.level);

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("sqlkeep: error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &SqlkeepConfig) -> Result<(), ClientError> {
    let client = open_client(config).await?;
    let result = match command {
        Commands::Migrate => migrate::run_migrate(&client).await,
        Commands::Query {
            sql,
            params,
            discard,
            json,
        } => query::run_query(&client, &sql, &params, discard, json).await,
        Commands::Status { json, plain } => status::run_status(&client, config, json, plain).await,
        Commands::Backup { output_dir } => {
            let output_dir =
                output_dir.unwrap_or_else(|| PathBuf::from(&config.backup.output_dir));
            backup::run_backup(&client, config, &output_dir).await
        }
        Commands::Restore { from } => backup::run_restore(&client, config, &from).await,
    };
    let closed = client.close().await;
    result.and(closed)
}

/// Builds the client, creating the database directory if needed. Relative
/// migration directories resolve against the working directory.
async fn open_client(config: &SqlkeepConfig) -> Result<DbClient, ClientError> {
    tokio::fs::create_dir_all(&config.database.directory)
        .await
        .map_err(|e| {
            ClientError::Config(format!(
                "cannot create database directory {}: {e}",
                config.database.directory
            ))
        })?;
    let base = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    Ok(DbClient::from_settings(config, &base))
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sqlkeep={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
