//! `minion progress`: crawl progress of a running minion.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use minion_core::CrawlProgress;

use super::UrlArg;

#[derive(Args, Debug)]
pub struct ProgressArgs {
    #[command(flatten)]
    pub target: UrlArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ProgressRow {
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "records crawled")]
    records: u64,
    #[tabled(rename = "page token")]
    page_token: String,
}

impl ProgressArgs {
    pub fn run(self) -> Result<()> {
        let response = minion_daemon::request_progress(&self.target.url)
            .with_context(|| format!("progress request to {} failed", self.target.url))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&response.progress)
                    .context("failed to serialize progress JSON")?
            );
            return Ok(());
        }

        print_table(&response.progress);
        Ok(())
    }
}

fn print_table(progress: &CrawlProgress) {
    let state = if progress.is_crawling {
        "CRAWLING".yellow().to_string()
    } else {
        "IDLE".green().to_string()
    };
    let row = ProgressRow {
        state,
        records: progress.crawled_record_number,
        page_token: progress
            .crawling_page_token
            .clone()
            .unwrap_or_else(|| "-".to_string()),
    };
    let mut table = Table::new(vec![row]);
    table.with(Style::rounded());
    println!("{table}");
}
