//! `minion run`: run the minion in the foreground.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use minion_daemon::LoggingHandler;

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let (_, config) = self.config.load()?;
        let minion_id = config.minion_id.clone();
        minion_daemon::start_blocking(config, Arc::new(LoggingHandler))
            .with_context(|| format!("minion '{minion_id}' exited with an error"))
    }
}
