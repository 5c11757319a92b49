mod claude;
mod cli;
mod config;
mod db;
mod error;
mod export;
mod fetcher;
mod leaderboard;
mod polymarket;
mod scanner;
mod tui;
mod types;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, APP_NAME};

/// The TUI owns the terminal, so its logs go to this file instead of stderr.
const TUI_LOG_FILE: &str = "polytracker.log";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A broken config file must not stop `init --force` from replacing it.
    if let Commands::Init(args) = &cli.command {
        if let Err(e) = cli::commands::init(args) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let mut cfg = match AppConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut cfg);

    if let Err(e) = init_logging(&cli, &cfg) {
        eprintln!("Logging setup failed: {e:#}");
        std::process::exit(1);
    }
    if let Some(source) = &cfg.source {
        info!(path = %source.display(), "Loaded config");
    }

    if let Err(e) = cli::commands::run(&cli, &cfg).await {
        error!("{APP_NAME}: {e}");
        if matches!(cli.command, Commands::Tui) {
            // The log file is not where the user is looking.
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli, cfg: &AppConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.level));

    if matches!(cli.command, Commands::Tui) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(TUI_LOG_FILE)
            .with_context(|| format!("opening {TUI_LOG_FILE}"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}
