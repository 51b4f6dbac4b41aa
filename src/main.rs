//! Terralens CLI
//!
//! Command-line interface for the Terralens map viewer core.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use terralens::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    info!("Terralens v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Some(cmd) => handle_command(cmd, config),
        None => {
            println!("Terralens v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: terralens::config::ViewerConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Catalog => commands::list_catalog(&config)?,
        Commands::Datasets => commands::list_datasets(&config)?,
        Commands::Resolve { layer, region } => commands::resolve(&config, layer, region.as_deref())?,
        Commands::Legend { layer } => commands::legend(config, layer)?,
        Commands::Replay { script } => commands::replay(config, &script)
            .with_context(|| format!("replay of {} failed", script.display()))?,
    }
    Ok(())
}
