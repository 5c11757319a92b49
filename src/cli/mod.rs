//! Command-line interface definitions.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::AppConfig;

/// Polytracker - find active Polymarket traders, rank them, and ask Claude what they are doing.
#[derive(Parser, Debug)]
#[command(name = "polytracker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: $HOME/.polytracker/config.yaml, then ./config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only keep scanned addresses seen in at least this many trades
    #[arg(long, global = true, default_value_t = 0)]
    pub min_trades: usize,

    /// Output filename for exports
    #[arg(long, global = true)]
    pub output: Option<String>,

    /// UI theme (dracula, nord, gruvbox, catppuccin, tokyo)
    #[arg(long, global = true)]
    pub theme: Option<String>,

    /// Claude Messages API endpoint
    #[arg(long, global = true)]
    pub claude_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan recent markets and record the addresses trading in them
    Scan(ScanArgs),

    /// Fetch a trader's history and generate a strategy thesis
    Analyze(AnalyzeArgs),

    /// Export the leaderboard (CSV) or a stored thesis (Markdown)
    Export(ExportArgs),

    /// Launch the interactive terminal UI
    Tui,

    /// Write a commented default config file
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Number of markets to sweep (default: scan.market_limit)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Trader wallet address
    pub address: String,

    /// Use stored data only; do not call the market API
    #[arg(long)]
    pub skip_fetch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    #[value(alias = "csv")]
    Leaderboard,
    #[value(aliases = ["analysis", "md"])]
    Thesis,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// What to export
    #[arg(short = 't', long = "type", value_enum, default_value = "leaderboard")]
    pub kind: ExportKind,

    /// Trader address (thesis export)
    #[arg(short = 'a', long)]
    pub trader: Option<String>,

    /// Output filename (auto-generated if not given)
    #[arg(short = 'f', long)]
    pub filename: Option<String>,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the file (default: $HOME/.polytracker/config.yaml)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Flags sit above file and environment values.
    pub fn apply_overrides(&self, cfg: &mut AppConfig) {
        if let Some(theme) = &self.theme {
            cfg.ui.theme = theme.clone();
        }
        if let Some(endpoint) = &self.claude_endpoint {
            cfg.claude.endpoint = endpoint.clone();
        }
    }
}
