//! `zendb exec`: operator escape hatch for raw SQL.

use anyhow::{Context, Result};
use clap::Args;

use zendb_sync::SqliteSink;

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Statement to run verbatim. No parameter binding, no transaction.
    pub sql: String,

    #[command(flatten)]
    pub config: ConfigArg,
}

impl ExecArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let sink = SqliteSink::open(&config.database).with_context(|| {
            format!("failed to open database {}", config.database.path.display())
        })?;
        let rows = sink
            .exec_raw_unchecked(&self.sql)
            .context("statement failed")?;
        println!("{rows} row(s) affected");
        Ok(())
    }
}
