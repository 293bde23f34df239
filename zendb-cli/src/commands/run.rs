//! `zendb run`: foreground scheduler.

use anyhow::{Context, Result};
use clap::Args;

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        zendb_daemon::start_blocking(config).context("scheduler exited with error")
    }
}
