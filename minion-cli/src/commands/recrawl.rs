//! `minion recrawl`: trigger a crawl on a running minion.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::UrlArg;

#[derive(Args, Debug)]
pub struct RecrawlArgs {
    #[command(flatten)]
    pub target: UrlArg,
}

impl RecrawlArgs {
    pub fn run(self) -> Result<()> {
        let response = minion_daemon::request_recrawl(&self.target.url)
            .with_context(|| format!("recrawl request to {} failed", self.target.url))?;
        if response.is_new_crawler {
            println!("{} crawl started", "✓".green());
        } else {
            println!("{} a crawl is already in progress", "•".yellow());
        }
        Ok(())
    }
}
