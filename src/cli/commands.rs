//! Command runners. Each opens what it needs from the config and prints a
//! short human-readable summary on stdout; diagnostics go through `tracing`.

use tracing::{info, warn};

use crate::claude::ClaudeClient;
use crate::config::{create_default_config, default_config_dir, env_var_name, AppConfig};
use crate::db::settings::THEME_KEY;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::export::Exporter;
use crate::fetcher::Fetcher;
use crate::polymarket::{ClientConfig, MarketClient};
use crate::scanner::Scanner;
use crate::tui::{self, app::App, theme::Theme, views::scan::ScanView, views::settings::SettingsView, TuiContext};

use super::{AnalyzeArgs, Cli, Commands, ExportArgs, ExportKind, InitArgs, ScanArgs};

pub async fn run(cli: &Cli, cfg: &AppConfig) -> Result<()> {
    match &cli.command {
        Commands::Scan(args) => scan(cli, cfg, args).await,
        Commands::Analyze(args) => analyze(cfg, args).await,
        Commands::Export(args) => export(cli, cfg, args).await,
        Commands::Tui => run_tui(cli, cfg).await,
        Commands::Init(args) => init(args),
    }
}

fn market_client(cfg: &AppConfig) -> Result<MarketClient> {
    MarketClient::new(ClientConfig::from(&cfg.polymarket))
}

fn claude_client(cfg: &AppConfig) -> Result<Option<ClaudeClient>> {
    if !cfg.has_claude_key() {
        return Ok(None);
    }
    ClaudeClient::new(&cfg.claude.api_key, &cfg.claude.endpoint).map(Some)
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

async fn scan(cli: &Cli, cfg: &AppConfig, args: &ScanArgs) -> Result<()> {
    let db = Database::open(&cfg.database.path).await?;
    let limit = args.limit.unwrap_or(cfg.scan.market_limit);
    let scanner = Scanner::new(market_client(cfg)?, db.clone()).with_min_trades(cli.min_trades);

    println!("Scanning Polymarket for recent activity ({limit} markets)...");
    let report = scanner.scan_recent_activity(limit).await?;
    db.close().await;

    println!("Scan complete.");
    println!(
        "  Markets: {} scanned, {} failed",
        report.markets_scanned, report.markets_failed
    );
    println!("  Trades seen: {}", report.trades_seen);
    println!(
        "  Traders: {} saved, {} failed, {} below --min-trades",
        report.traders_saved, report.traders_failed, report.traders_filtered
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn analyze(cfg: &AppConfig, args: &AnalyzeArgs) -> Result<()> {
    let address = args.address.trim();
    if address.is_empty() {
        return Err(AppError::InvalidInput("trader address must not be empty".to_string()));
    }
    let db = Database::open(&cfg.database.path).await?;

    if !args.skip_fetch {
        println!("Fetching history for trader: {address}");
        let report = Fetcher::new(market_client(cfg)?, db.clone())
            .fetch_trader_history(address)
            .await?;
        println!(
            "Data fetch complete: {} trades saved, {} skipped, {} new markets.",
            report.trades_saved, report.trades_skipped, report.markets_fetched
        );
    }

    let trader = db
        .get_trader(address)
        .await?
        .ok_or_else(|| AppError::TraderNotFound(address.to_string()))?;
    let trades = db.get_trades_by_trader(address).await?;
    let ids: Vec<String> = trades.iter().map(|t| t.market_id.clone()).collect();
    let markets = db.get_markets(&ids).await?;
    println!("Trader: {} ({} trades on record)", trader.display_name(), trades.len());

    let Some(claude) = claude_client(cfg)? else {
        println!();
        println!("Claude API key not configured. Skipping AI analysis.");
        println!(
            "Set {} or add claude.api_key to config.yaml",
            env_var_name("claude.api_key")
        );
        return Ok(());
    };

    println!();
    println!("Analyzing trader with Claude AI...");
    info!(address, endpoint = claude.url(), trades = trades.len(), "Requesting thesis");
    let outcome = claude.analyze_trader(Some(&trader), &trades, &markets).await?;
    if outcome.is_truncated() {
        println!("Warning: Response was truncated due to token limit");
    }
    let result = outcome.into_result();

    println!();
    println!("{}", result.thesis);
    println!();
    println!("---");
    println!(
        "Model: {} | Tokens: {} in / {} out",
        result.model, result.input_tokens, result.output_tokens
    );

    match db.save_analysis(address, &result.thesis, result.created_at).await {
        Ok(id) => info!(address, id, "Analysis saved"),
        Err(e) => {
            warn!(address, "Failed to save analysis: {e}");
            println!("Warning: failed to save analysis: {e}");
        }
    }
    db.close().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

async fn export(cli: &Cli, cfg: &AppConfig, args: &ExportArgs) -> Result<()> {
    // -f wins over the global --output.
    let filename = args.filename.as_deref().or(cli.output.as_deref());
    let exporter = Exporter::new(&cfg.export.dir);

    match args.kind {
        ExportKind::Leaderboard => {
            let db = Database::open(&cfg.database.path).await?;
            println!("Exporting leaderboard to CSV...");
            let traders = db.list_traders().await?;
            db.close().await;
            if traders.is_empty() {
                println!("No traders found. Run 'polytracker scan' first.");
                return Ok(());
            }
            let path = exporter.export_leaderboard_csv(&traders, filename)?;
            println!("Exported {} traders to: {}", traders.len(), path.display());
        }
        ExportKind::Thesis => {
            let Some(address) = args.trader.as_deref().map(str::trim).filter(|a| !a.is_empty()) else {
                return Err(AppError::InvalidInput(
                    "trader address required for thesis export (use --trader)".to_string(),
                ));
            };
            let db = Database::open(&cfg.database.path).await?;
            println!("Exporting thesis for trader: {address}...");
            let result = exporter.export_analysis_from_db(&db, address, filename).await;
            db.close().await;
            println!("Exported thesis to: {}", result?.display());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// tui
// ---------------------------------------------------------------------------

async fn run_tui(cli: &Cli, cfg: &AppConfig) -> Result<()> {
    let db = Database::open(&cfg.database.path).await?;

    if let Some(name) = cli.theme.as_deref() {
        if Theme::find(name).is_none() {
            warn!(theme = name, "Unknown theme, using dracula");
        }
    }
    let stored = match db.get_setting(THEME_KEY).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Could not read stored theme: {e}");
            None
        }
    };
    let theme = tui::resolve_theme(cli.theme.as_deref(), stored.as_deref(), &cfg.ui.theme);
    info!(theme = theme.name, "Starting TUI");

    let ctx = TuiContext {
        db: db.clone(),
        client: market_client(cfg)?,
        claude: claude_client(cfg)?,
        exporter: Exporter::new(&cfg.export.dir),
        scan_limit: cfg.scan.market_limit,
        min_trades: cli.min_trades,
    };
    let app = App::new(
        theme,
        ScanView::new(cfg.scan.market_limit, cli.min_trades),
        SettingsView::from_config(cfg),
    );

    let result = tui::run(ctx, app).await;
    db.close().await;
    result
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

pub fn init(args: &InitArgs) -> Result<()> {
    let path = match &args.path {
        Some(p) => p.clone(),
        None => default_config_dir()
            .map(|dir| dir.join("config.yaml"))
            .ok_or_else(|| AppError::Config("cannot determine home directory; pass --path".to_string()))?,
    };
    create_default_config(&path, args.force)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
