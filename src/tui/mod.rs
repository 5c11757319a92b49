//! Interactive terminal UI.
//!
//! The loop draws, waits on whichever of keyboard input, a finished command
//! or the animation tick comes first, and hands the resulting [`Msg`] to
//! [`App::update`]. Commands run as tokio tasks so the loop never blocks on
//! the network or the store.

pub mod app;
pub mod format;
pub mod theme;
pub mod views;

use std::collections::HashMap;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::claude::{AnalysisOutcome, ClaudeClient};
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::export::Exporter;
use crate::leaderboard::load_page;
use crate::polymarket::MarketClient;
use crate::scanner::Scanner;
use crate::types::{Market, Trade, Trader};
use app::{App, Command, Msg, Slot};
use theme::Theme;
use views::analysis::{AnalysisEvent, ANALYSIS_TIMEOUT_SECS};
use views::leaderboard::LeaderboardEvent;
use views::scan::ScanEvent;
use views::settings::SettingsEvent;
use views::trader_detail::{DetailData, DetailEvent};
use views::watchlist::{WatchEntry, WatchlistEvent};

/// Spinner frame rate.
const TICK_RATE: Duration = Duration::from_millis(120);

/// Everything commands need. Shared read-only across tasks.
#[derive(Debug, Clone)]
pub struct TuiContext {
    pub db: Database,
    pub client: MarketClient,
    /// `None` when no API key is configured; analysis then fails with a notice.
    pub claude: Option<ClaudeClient>,
    pub exporter: Exporter,
    pub scan_limit: usize,
    pub min_trades: usize,
}

/// `--theme` beats the stored setting, which beats the config file.
pub fn resolve_theme(flag: Option<&str>, stored: Option<&str>, configured: &str) -> Theme {
    let name = flag.or(stored).unwrap_or(configured);
    Theme::by_name(name)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run(ctx: TuiContext, mut app: App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app, Arc::new(ctx)).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    ctx: Arc<TuiContext>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut runner = Runner::new(ctx, tx);
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK_RATE);

    runner.dispatch(app.init());

    while !app.should_quit() {
        terminal.draw(|f| app.render(f))?;

        let msg = tokio::select! {
            ev = events.next() => match ev {
                Some(Ok(Event::Key(key))) => Msg::Key(key),
                // Resize and friends only need a redraw.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            Some(msg) = rx.recv() => msg,
            _ = tick.tick() => Msg::Tick,
        };

        let commands = app.update(msg);
        runner.dispatch(commands);
    }

    runner.shutdown();
    info!("TUI closed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Command runner
// ---------------------------------------------------------------------------

/// Spawns commands and keeps at most one task alive per [`Slot`].
struct Runner {
    ctx: Arc<TuiContext>,
    tx: mpsc::UnboundedSender<Msg>,
    in_flight: HashMap<Slot, JoinHandle<()>>,
}

impl Runner {
    fn new(ctx: Arc<TuiContext>, tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self {
            ctx,
            tx,
            in_flight: HashMap::new(),
        }
    }

    fn dispatch(&mut self, commands: Vec<Command>) {
        for cmd in commands {
            self.spawn(cmd);
        }
    }

    fn spawn(&mut self, cmd: Command) {
        let slot = cmd.slot();
        if let Some(slot) = slot {
            if let Some(old) = self.in_flight.remove(&slot) {
                if !old.is_finished() {
                    debug!(?slot, "Superseding in-flight command");
                    old.abort();
                }
            }
        }
        if matches!(cmd, Command::Cancel(_)) {
            return;
        }

        let ctx = Arc::clone(&self.ctx);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let msg = execute(cmd, &ctx).await;
            // The loop is gone when this fails; nothing left to tell.
            let _ = tx.send(msg);
        });
        if let Some(slot) = slot {
            self.in_flight.insert(slot, handle);
        }
    }

    fn shutdown(&mut self) {
        for (_, handle) in self.in_flight.drain() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Run one command to completion and wrap the outcome for the view that asked.
pub async fn execute(cmd: Command, ctx: &TuiContext) -> Msg {
    match cmd {
        Command::LoadLeaderboard(ranking) => {
            let result = load_page(&ctx.db, &ranking).await;
            Msg::Leaderboard(LeaderboardEvent::Loaded(result.map_err(|e| e.to_string())))
        }
        Command::LoadWatchlist => {
            let result = load_watchlist(&ctx.db).await;
            Msg::Watchlist(WatchlistEvent::Loaded(result.map_err(|e| e.to_string())))
        }
        Command::LoadTraderDetail(address) => {
            let result = load_detail(&ctx.db, &address).await.map_err(|e| e.to_string());
            Msg::Detail(DetailEvent::Loaded { address, result })
        }
        Command::SetWatched { address, watched } => {
            let result = set_watched(&ctx.db, &address, watched)
                .await
                .map(|()| watched)
                .map_err(|e| e.to_string());
            Msg::Detail(DetailEvent::WatchChanged { address, result })
        }
        Command::RemoveWatch(address) => {
            let removed = ctx.db.remove_from_watchlist(&address).await;
            let result = match removed {
                Ok(_) => Ok(address),
                Err(e) => Err(e.to_string()),
            };
            Msg::Watchlist(WatchlistEvent::Removed(result))
        }
        Command::SaveNote { address, notes } => {
            let updated = ctx.db.update_watchlist_notes(&address, &notes).await;
            let result = match updated {
                Ok(true) => Ok((address, notes)),
                Ok(false) => Err(format!("{address} is no longer watched")),
                Err(e) => Err(e.to_string()),
            };
            Msg::Watchlist(WatchlistEvent::NoteSaved(result))
        }
        Command::LoadAnalysisData(address) => {
            let result = load_analysis_data(&ctx.db, &address).await.map_err(|e| e.to_string());
            Msg::Analysis(AnalysisEvent::DataLoaded { address, result })
        }
        Command::RunAnalysis { trader, trades, markets } => {
            let result = run_analysis(ctx, &trader, &trades, &markets)
                .await
                .map_err(|e| e.to_string());
            Msg::Analysis(AnalysisEvent::Finished {
                address: trader.address,
                result,
            })
        }
        Command::SaveThesis { trader, thesis } => {
            let result = ctx
                .exporter
                .export_thesis_markdown(&trader, &thesis, None)
                .map_err(|e| e.to_string());
            Msg::Analysis(AnalysisEvent::Saved {
                address: trader.address,
                result,
            })
        }
        Command::RunScan => {
            let scanner = Scanner::new(ctx.client.clone(), ctx.db.clone()).with_min_trades(ctx.min_trades);
            let result = scanner.scan_recent_activity(ctx.scan_limit).await;
            Msg::Scan(ScanEvent::Finished(result.map_err(|e| e.to_string())))
        }
        Command::SaveSetting { key, value } => {
            let saved = ctx.db.set_setting(&key, &value).await;
            let result = match saved {
                Ok(()) => Ok(value),
                Err(e) => Err(e.to_string()),
            };
            Msg::Settings(SettingsEvent::Saved(result))
        }
        // Handled by the runner before anything is spawned.
        Command::Cancel(_) => Msg::Tick,
    }
}

async fn load_watchlist(db: &Database) -> Result<Vec<WatchEntry>> {
    let items = db.list_watchlist().await?;
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let trader = db.get_trader(&item.trader_address).await?;
        let trades = db.count_trades_by_trader(&item.trader_address).await?;
        entries.push(WatchEntry { item, trader, trades });
    }
    Ok(entries)
}

async fn load_detail(db: &Database, address: &str) -> Result<DetailData> {
    let trader = db
        .get_trader(address)
        .await?
        .ok_or_else(|| AppError::TraderNotFound(address.to_string()))?;
    let (trades, markets) = load_analysis_data(db, address).await?;
    let watched = db.is_watched(address).await?;
    let analyses = db.list_analyses(address).await?.len();
    Ok(DetailData {
        trader,
        trades,
        markets,
        watched,
        analyses,
    })
}

async fn load_analysis_data(db: &Database, address: &str) -> Result<(Vec<Trade>, HashMap<String, Market>)> {
    let trades = db.get_trades_by_trader(address).await?;
    let ids: Vec<String> = trades.iter().map(|t| t.market_id.clone()).collect();
    let markets = db.get_markets(&ids).await?;
    Ok((trades, markets))
}

async fn set_watched(db: &Database, address: &str, watched: bool) -> Result<()> {
    if watched {
        db.add_to_watchlist(address, "", Utc::now()).await
    } else {
        db.remove_from_watchlist(address).await.map(|_| ())
    }
}

/// Model call under a deadline. A finished thesis is stored even when truncated.
async fn run_analysis(
    ctx: &TuiContext,
    trader: &Trader,
    trades: &[Trade],
    markets: &HashMap<String, Market>,
) -> Result<AnalysisOutcome> {
    let claude = ctx.claude.as_ref().ok_or(AppError::NoApiKey)?;
    let deadline = Duration::from_secs(ANALYSIS_TIMEOUT_SECS);
    let outcome = tokio::time::timeout(deadline, claude.analyze_trader(Some(trader), trades, markets))
        .await
        .map_err(|_| AppError::Timeout(ANALYSIS_TIMEOUT_SECS))??;

    let result = outcome.result();
    if let Err(e) = ctx.db.save_analysis(&trader.address, &result.thesis, result.created_at).await {
        warn!(address = %trader.address, "Failed to save analysis: {e}");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{db, trade, trader};
    use crate::leaderboard::Ranking;
    use crate::polymarket::test_support::client;
    use crate::tui::theme::{DRACULA, GRUVBOX, NORD};

    async fn ctx(dir: &std::path::Path) -> TuiContext {
        TuiContext {
            db: db().await,
            // Nothing listens here; commands under test never reach the network.
            client: client("http://127.0.0.1:9"),
            claude: None,
            exporter: Exporter::new(dir),
            scan_limit: 5,
            min_trades: 0,
        }
    }

    #[test]
    fn theme_precedence() {
        assert_eq!(resolve_theme(Some("nord"), Some("gruvbox"), "dracula"), NORD);
        assert_eq!(resolve_theme(None, Some("gruvbox"), "nord"), GRUVBOX);
        assert_eq!(resolve_theme(None, None, "nord"), NORD);
        assert_eq!(resolve_theme(Some("neon"), None, "nord"), DRACULA);
    }

    #[tokio::test]
    async fn leaderboard_page_comes_from_store() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;
        ctx.db.save_trader(&trader("0xa", 10.0)).await.unwrap();
        ctx.db.save_trader(&trader("0xb", 50.0)).await.unwrap();

        match execute(Command::LoadLeaderboard(Ranking::default()), &ctx).await {
            Msg::Leaderboard(LeaderboardEvent::Loaded(Ok((traders, total)))) => {
                assert_eq!(total, 2);
                assert_eq!(traders[0].address, "0xb");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn watch_toggle_then_list_then_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;
        ctx.db.save_trader(&trader("0xa", 10.0)).await.unwrap();

        let msg = execute(
            Command::SetWatched {
                address: "0xa".into(),
                watched: true,
            },
            &ctx,
        )
        .await;
        assert!(matches!(msg, Msg::Detail(DetailEvent::WatchChanged { result: Ok(true), .. })));

        let msg = execute(
            Command::SaveNote {
                address: "0xa".into(),
                notes: "steady".into(),
            },
            &ctx,
        )
        .await;
        assert!(matches!(msg, Msg::Watchlist(WatchlistEvent::NoteSaved(Ok(_)))));

        match execute(Command::LoadWatchlist, &ctx).await {
            Msg::Watchlist(WatchlistEvent::Loaded(Ok(entries))) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].item.notes, "steady");
                assert_eq!(entries[0].trader.as_ref().map(|t| t.address.as_str()), Some("0xa"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let msg = execute(Command::RemoveWatch("0xa".into()), &ctx).await;
        assert!(matches!(msg, Msg::Watchlist(WatchlistEvent::Removed(Ok(ref a))) if a == "0xa"));
        assert!(!ctx.db.is_watched("0xa").await.unwrap());
    }

    #[tokio::test]
    async fn note_for_unwatched_trader_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;
        let msg = execute(
            Command::SaveNote {
                address: "0xgone".into(),
                notes: "x".into(),
            },
            &ctx,
        )
        .await;
        assert!(matches!(msg, Msg::Watchlist(WatchlistEvent::NoteSaved(Err(_)))));
    }

    #[tokio::test]
    async fn detail_joins_trades_markets_and_watch_state() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;
        ctx.db.save_trader(&trader("0xa", 10.0)).await.unwrap();
        ctx.db.save_trade(&trade("t1", "0xa", "m1", 0)).await.unwrap();
        ctx.db.save_trade(&trade("t2", "0xa", "m1", 60)).await.unwrap();
        ctx.db.add_to_watchlist("0xa", "", Utc::now()).await.unwrap();
        ctx.db.save_analysis("0xa", "old take", Utc::now()).await.unwrap();

        match execute(Command::LoadTraderDetail("0xa".into()), &ctx).await {
            Msg::Detail(DetailEvent::Loaded { address, result: Ok(data) }) => {
                assert_eq!(address, "0xa");
                assert_eq!(data.trades.len(), 2);
                assert_eq!(data.trades[0].id, "t2");
                assert!(data.watched);
                assert_eq!(data.analyses, 1);
                // The market row was never stored.
                assert!(data.markets.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_trader_detail_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;
        match execute(Command::LoadTraderDetail("0xnope".into()), &ctx).await {
            Msg::Detail(DetailEvent::Loaded { result: Err(e), .. }) => {
                assert_eq!(e, "trader not found: 0xnope");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn analysis_without_key_reports_it() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;
        let msg = execute(
            Command::RunAnalysis {
                trader: trader("0xa", 1.0),
                trades: vec![],
                markets: HashMap::new(),
            },
            &ctx,
        )
        .await;
        match msg {
            Msg::Analysis(AnalysisEvent::Finished { address, result: Err(e) }) => {
                assert_eq!(address, "0xa");
                assert_eq!(e, "claude API key is not configured");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn thesis_and_theme_are_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;

        let msg = execute(
            Command::SaveThesis {
                trader: trader("0xabcdef1234567890", 1.0),
                thesis: "Buys the dip.".into(),
            },
            &ctx,
        )
        .await;
        match msg {
            Msg::Analysis(AnalysisEvent::Saved { result: Ok(path), .. }) => {
                let body = std::fs::read_to_string(&path).unwrap();
                assert!(body.contains("Buys the dip."));
                assert!(path.starts_with(tmp.path()));
            }
            other => panic!("unexpected {other:?}"),
        }

        let msg = execute(
            Command::SaveSetting {
                key: "ui.theme".into(),
                value: "tokyo".into(),
            },
            &ctx,
        )
        .await;
        assert!(matches!(msg, Msg::Settings(SettingsEvent::Saved(Ok(ref v))) if v == "tokyo"));
        assert_eq!(ctx.db.get_setting("ui.theme").await.unwrap().as_deref(), Some("tokyo"));
    }

    #[tokio::test]
    async fn newer_command_supersedes_older_in_same_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = Runner::new(Arc::new(ctx(tmp.path()).await), tx);

        // The scan targets a dead port and retries; the cancel lands first.
        runner.dispatch(vec![Command::RunScan, Command::Cancel(Slot::Scan)]);
        runner.dispatch(vec![Command::LoadWatchlist]);

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, Msg::Watchlist(WatchlistEvent::Loaded(Ok(_)))));
        assert!(!runner.in_flight.contains_key(&Slot::Scan));
        runner.shutdown();
    }

    #[tokio::test]
    async fn analysis_data_loads_on_a_spawned_task() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path()).await;
        ctx.db.save_trade(&trade("t1", "0xa", "m1", 0)).await.unwrap();
        ctx.db.save_trade(&trade("t2", "0xa", "m2", 60)).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = Runner::new(Arc::new(ctx), tx);

        runner.dispatch(vec![Command::LoadAnalysisData("0xa".into())]);

        match rx.recv().await.unwrap() {
            Msg::Analysis(AnalysisEvent::DataLoaded { address, result: Ok((trades, markets)) }) => {
                assert_eq!(address, "0xa");
                assert_eq!(trades.len(), 2);
                assert!(markets.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        runner.shutdown();
    }
}
