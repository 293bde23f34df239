pub mod checkpoints;
pub mod exec;
pub mod run;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use zendb_core::{config, Config};

/// `--config` flag shared by every subcommand.
#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Config file (YAML, or JSON with a `.json` extension).
    /// Defaults to `~/.zendb/config.yaml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigArg {
    pub fn load(&self) -> Result<Config> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => {
                let home = dirs::home_dir().context("could not determine home directory")?;
                config::default_path_at(&home)
            }
        };
        config::load_at(&path).with_context(|| format!("failed to load config {}", path.display()))
    }
}
