// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sqlkeep query` command implementation.

use sqlkeep_core::{ClientError, ExecMode, Row, SqlValue};
use sqlkeep_storage::DbClient;

pub async fn run_query(
    client: &DbClient,
    sql: &str,
    params: &[String],
    discard: bool,
    json: bool,
) -> Result<(), ClientError> {
    let params: Vec<SqlValue> = params.iter().map(|p| parse_param(p)).collect();
    let mode = if discard {
        ExecMode::Discard
    } else {
        ExecMode::Rows
    };
    let rows = client.exec(sql, &params, mode).await?;

    if json {
        println!("{}", encode_rows(&rows)?);
    } else {
        for row in &rows {
            println!("{}", format_row(row));
        }
    }
    Ok(())
}

fn encode_rows(rows: &[Row]) -> Result<String, ClientError> {
    serde_json::to_string_pretty(rows).map_err(ClientError::query)
}

/// Integers and reals bind as numbers, `null` as NULL, anything else as text.
fn parse_param(raw: &str) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        SqlValue::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        SqlValue::Real(f)
    } else {
        SqlValue::Text(raw.to_string())
    }
}

fn format_row(row: &Row) -> String {
    row.iter()
        .map(|value| match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Real(f) => f.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Blob(b) => format!("<{} bytes>", b.len()),
        })
        .collect::<Vec<_>>()
        .join("|")
}
