//! `zendb sync`: a single pass, reported.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use zendb_sync::{
    engine::format_cursor, FeedStatus, PassReport, SqliteSink, SyncEngine, ZendeskSource,
};

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct FeedRow {
    #[tabled(rename = "feed")]
    feed: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "applied")]
    applied: usize,
    #[tabled(rename = "failed")]
    failed: usize,
    #[tabled(rename = "discarded batches")]
    discarded: usize,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        if !self.json {
            zendb_daemon::init_tracing();
        }

        let sink = SqliteSink::open(&config.database).with_context(|| {
            format!("failed to open database {}", config.database.path.display())
        })?;
        let source = ZendeskSource::new(&config.zendesk).context("invalid zendesk settings")?;
        let mut engine =
            SyncEngine::new(source, sink).with_post_process(config.post_process.clone());

        let report = engine.run_once();
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize pass report")?
            );
        } else {
            print_table(&report);
        }

        let failed = report.failed_feeds();
        if failed > 0 {
            bail!("{failed} feed(s) failed");
        }
        Ok(())
    }
}

fn print_table(report: &PassReport) {
    let rows: Vec<FeedRow> = report
        .feeds
        .iter()
        .map(|feed| {
            let (status, detail) = describe(&feed.status);
            FeedRow {
                feed: feed.feed.to_string(),
                status,
                detail,
                applied: feed.applied,
                failed: feed.failed,
                discarded: feed.discarded_batches,
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for outcome in &report.post_process {
        match &outcome.error {
            Some(error) => println!(
                "{} {}: {error}",
                "post-process failed".red(),
                outcome.statement
            ),
            None => println!(
                "{} {} ({} rows)",
                "post-process".green(),
                outcome.statement,
                outcome.rows.unwrap_or_default()
            ),
        }
    }
    println!("pass finished in {}ms", report.duration_ms);
}

fn describe(status: &FeedStatus) -> (String, String) {
    match status {
        FeedStatus::Listed => ("listed".green().to_string(), String::new()),
        FeedStatus::Synced { from, to } => (
            "synced".green().to_string(),
            format!("{} -> {}", format_cursor(*from), format_cursor(*to)),
        ),
        FeedStatus::Unchanged { at } => ("unchanged".normal().to_string(), format_cursor(*at)),
        FeedStatus::Held { at } => ("held".yellow().to_string(), format_cursor(*at)),
        FeedStatus::Failed { error } => ("failed".red().to_string(), error.clone()),
    }
}
