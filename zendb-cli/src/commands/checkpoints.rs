//! `zendb checkpoints`: stored cursor per feed.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use zendb_sync::{engine::format_cursor, SqliteSink};

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct CheckpointsArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckpointJson {
    name: String,
    last_value: i64,
    at: String,
}

#[derive(Tabled)]
struct CheckpointRow {
    #[tabled(rename = "checkpoint")]
    name: String,
    #[tabled(rename = "value")]
    value: i64,
    #[tabled(rename = "as of")]
    at: String,
    #[tabled(rename = "age")]
    age: String,
}

impl CheckpointsArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let mut sink = SqliteSink::open(&config.database).with_context(|| {
            format!("failed to open database {}", config.database.path.display())
        })?;
        let checkpoints: BTreeMap<String, i64> = sink.fetch_checkpoints().into_iter().collect();

        if self.json {
            let payload: Vec<CheckpointJson> = checkpoints
                .into_iter()
                .map(|(name, last_value)| CheckpointJson {
                    name,
                    at: format_cursor(last_value),
                    last_value,
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to serialize checkpoints JSON")?
            );
            return Ok(());
        }

        if checkpoints.is_empty() {
            println!("{}", "No checkpoints stored yet.".yellow());
            return Ok(());
        }

        let rows: Vec<CheckpointRow> = checkpoints
            .into_iter()
            .map(|(name, value)| CheckpointRow {
                name,
                value,
                at: format_cursor(value),
                age: format_age(value, Utc::now()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

/// Rough age of a timestamp cursor; id cursors have no meaningful age.
fn format_age(cursor: i64, now: DateTime<Utc>) -> String {
    let Some(at) = DateTime::<Utc>::from_timestamp(cursor, 0).filter(|_| cursor > 0) else {
        return "-".to_string();
    };
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
