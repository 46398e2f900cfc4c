//! `minion check`: validate a config file.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use minion_core::MinionConfig;

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let (path, config) = self.config.load()?;
        println!("{} {}", "✓".green(), format!("config OK: {}", path.display()).bold());
        print_summary(&config);
        Ok(())
    }
}

fn print_summary(config: &MinionConfig) {
    let list = |values: &[String]| {
        if values.is_empty() {
            "-".to_string()
        } else {
            values.join(", ")
        }
    };
    let concurrency = match config.concurrency {
        0 => "unbounded".to_string(),
        n => n.to_string(),
    };
    let tenancy = match (config.multi_tenant, config.tenant_id) {
        (true, Some(id)) => format!("multi-tenant (tenant {id})"),
        _ => "single-tenant".to_string(),
    };

    println!("  minion id         {}", config.minion_id);
    println!("  listen port       {}", config.listen_port);
    println!("  webhook url       {}", config.hook_url());
    println!("  registry          {}", config.registry_url);
    println!("  aspects           {}", list(&config.aspects));
    println!("  optional aspects  {}", list(&config.optional_aspects));
    println!("  aspect defs       {}", config.write_aspect_defs.len());
    println!("  concurrency       {concurrency}");
    println!("  tenancy           {tenancy}");
}
