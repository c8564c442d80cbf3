//! SWR Coupler CLI entry point.

use anyhow::Result;
use clap::Parser;

use swr_coupler::cli::{commands, handle_error, Cli, Commands};
use swr_coupler::domain::models::Config;
use swr_coupler::infrastructure::config::ConfigLoader;
use swr_coupler::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config: Config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&LogConfig::from_settings(&config.logging)?)?;

    match cli.command {
        Commands::Swr(args) => commands::swr::execute(args, &config, cli.json).await,
        Commands::Naive(args) => commands::naive::execute(args, &config, cli.json).await,
        Commands::Offset(args) => commands::offset::execute(args, cli.json),
        Commands::Summary(args) => commands::summary::execute(args, &config, cli.json).await,
    }
}
