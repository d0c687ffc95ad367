//! Pinion - dependency locking with first-class git sources
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use pinion::cli::{Cli, Commands};
use pinion::config::{Config, ConfigManager};
use pinion::error::PinionResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PinionResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Config path: {}", config_manager.path().display());

    match cli.command {
        Commands::Install(args) => pinion::cli::commands::install(args, &cli.manifest, &config).await,
        Commands::Update(args) => pinion::cli::commands::update(args, &cli.manifest, &config).await,
        Commands::Config(args) => {
            pinion::cli::commands::config(args, &config_manager, &config).await
        }
        Commands::Cache(args) => pinion::cli::commands::cache(args, &config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `general.verbose` counts as one level
fn init_logging(verbose: u8, config: &Config) {
    let level = verbose.saturating_add(u8::from(config.general.verbose));
    let filter = match level {
        0 => EnvFilter::new("pinion=warn"),
        1 => EnvFilter::new("pinion=info"),
        _ => EnvFilter::new("pinion=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
