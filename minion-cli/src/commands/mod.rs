pub mod check;
pub mod progress;
pub mod recrawl;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use minion_core::{config, MinionConfig};

/// Config file selection shared by `run` and `check`.
#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Path to the minion config file [default: ~/.minion/config.yaml].
    #[arg(long, env = "MINION_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConfigArg {
    pub fn path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => {
                let home = dirs::home_dir().context("could not determine home directory")?;
                Ok(config::default_path_at(&home))
            }
        }
    }

    /// Load and validate.
    pub fn load(&self) -> Result<(PathBuf, MinionConfig)> {
        let path = self.path()?;
        let config = config::load_at(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config at {}", path.display()))?;
        Ok((path, config))
    }
}

/// Address of a running minion shared by `recrawl` and `progress`.
#[derive(Args, Debug)]
pub struct UrlArg {
    /// Base URL of the running minion.
    #[arg(long, env = "MINION_URL", default_value = "http://localhost:6123")]
    pub url: String,
}
