mod cli;
mod commands;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;

use cli::{Cli, Commands};
use octofhir_records::config::loader::load_config;
use octofhir_records::observability::init_tracing_with_level;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).map_err(|e| anyhow!(e))?;
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing_with_level(level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Patch(args) => commands::patch::run(args, format)?,
        Commands::SearchSql(args) => commands::search::run(&config, args, cli.format)?,
        Commands::Migrate(args) => commands::db::migrate(&config, args).await?,
        Commands::History(args) => commands::db::history(&config, args, format).await?,
        Commands::CheckConfig => commands::config::check(&config)?,
    }

    Ok(())
}
