//! Top-level state machine for the terminal UI.
//!
//! Input and command results arrive as [`Msg`]s. [`App::update`] routes each
//! one to the view that owns it and returns the [`Command`]s to run next; the
//! runtime executes those off the render loop and feeds their results back in.

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::db::settings::THEME_KEY;
use crate::leaderboard::Ranking;
use crate::tui::theme::Theme;
use crate::tui::views::analysis::{AnalysisEvent, AnalysisView};
use crate::tui::views::leaderboard::{LeaderboardEvent, LeaderboardView};
use crate::tui::views::scan::{ScanEvent, ScanState, ScanView};
use crate::tui::views::settings::{SettingsEvent, SettingsView};
use crate::tui::views::trader_detail::{DetailEvent, TraderDetailView};
use crate::tui::views::watchlist::{WatchlistEvent, WatchlistView};
use crate::tui::views::Effect;
use crate::types::{Market, Trade, Trader};

// ---------------------------------------------------------------------------
// Messages and commands
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Msg {
    Key(KeyEvent),
    Tick,
    Scan(ScanEvent),
    Leaderboard(LeaderboardEvent),
    Watchlist(WatchlistEvent),
    Detail(DetailEvent),
    Analysis(AnalysisEvent),
    Settings(SettingsEvent),
}

/// Work the runtime performs off the render loop. Each one answers with a single [`Msg`].
#[derive(Debug, Clone)]
pub enum Command {
    LoadLeaderboard(Ranking),
    LoadWatchlist,
    LoadTraderDetail(String),
    SetWatched { address: String, watched: bool },
    RemoveWatch(String),
    SaveNote { address: String, notes: String },
    LoadAnalysisData(String),
    RunAnalysis {
        trader: Trader,
        trades: Vec<Trade>,
        markets: HashMap<String, Market>,
    },
    SaveThesis { trader: Trader, thesis: String },
    RunScan,
    SaveSetting { key: String, value: String },
    /// Abort whatever is outstanding in the slot.
    Cancel(Slot),
}

/// Reads that supersede each other. A newer command in a slot aborts the older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Leaderboard,
    Watchlist,
    Detail,
    Analysis,
    Scan,
}

impl Command {
    /// `None` for writes, which always run to completion.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Command::LoadLeaderboard(_) => Some(Slot::Leaderboard),
            Command::LoadWatchlist => Some(Slot::Watchlist),
            Command::LoadTraderDetail(_) => Some(Slot::Detail),
            Command::LoadAnalysisData(_) | Command::RunAnalysis { .. } => Some(Slot::Analysis),
            Command::RunScan => Some(Slot::Scan),
            Command::Cancel(slot) => Some(*slot),
            Command::SetWatched { .. }
            | Command::RemoveWatch(_)
            | Command::SaveNote { .. }
            | Command::SaveThesis { .. }
            | Command::SaveSetting { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Scan,
    Leaderboard,
    Watchlist,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Scan, Tab::Leaderboard, Tab::Watchlist, Tab::Settings];

    fn from_key(c: char) -> Option<Tab> {
        match c {
            '1' => Some(Tab::Scan),
            '2' => Some(Tab::Leaderboard),
            '3' => Some(Tab::Watchlist),
            '4' => Some(Tab::Settings),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Tab::Scan => "1. Scan",
            Tab::Leaderboard => "2. Leaderboard",
            Tab::Watchlist => "3. Watchlist",
            Tab::Settings => "4. Settings",
        }
    }

    fn index(&self) -> usize {
        Tab::ALL.iter().position(|t| t == self).unwrap_or(0)
    }
}

/// What fills the body: the active tab, or a trader screen stacked on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Tab,
    Detail,
    Analysis,
}

pub struct App {
    pub tab: Tab,
    pub screen: Screen,
    pub theme: Theme,
    pub scan: ScanView,
    pub leaderboard: LeaderboardView,
    pub watchlist: WatchlistView,
    pub settings: SettingsView,
    pub detail: Option<TraderDetailView>,
    pub analysis: Option<AnalysisView>,
    tick: u64,
    quit: bool,
}

impl App {
    pub fn new(theme: Theme, scan: ScanView, settings: SettingsView) -> Self {
        Self {
            tab: Tab::Leaderboard,
            screen: Screen::Tab,
            theme,
            scan,
            leaderboard: LeaderboardView::new(),
            watchlist: WatchlistView::new(),
            settings,
            detail: None,
            analysis: None,
            tick: 0,
            quit: false,
        }
    }

    /// Commands to run before the first key press.
    pub fn init(&mut self) -> Vec<Command> {
        vec![self.leaderboard.load()]
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn update(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::Key(key) => self.on_key(key),
            Msg::Tick => {
                self.tick = self.tick.wrapping_add(1);
                vec![]
            }
            Msg::Scan(ev) => {
                let effect = self.scan.handle_event(ev);
                let mut cmds = self.apply(effect);
                if matches!(self.scan.state, ScanState::Done(_)) {
                    cmds.push(self.leaderboard.load());
                }
                cmds
            }
            Msg::Leaderboard(ev) => {
                let effect = self.leaderboard.handle_event(ev);
                self.apply(effect)
            }
            Msg::Watchlist(ev) => {
                let effect = self.watchlist.handle_event(ev);
                self.apply(effect)
            }
            Msg::Settings(ev) => {
                let effect = self.settings.handle_event(ev);
                self.apply(effect)
            }
            Msg::Detail(ev) => match self.detail.as_mut() {
                Some(view) => {
                    let effect = view.handle_event(ev);
                    self.apply(effect)
                }
                None => vec![],
            },
            Msg::Analysis(ev) => match self.analysis.as_mut() {
                Some(view) => {
                    let effect = view.handle_event(ev);
                    self.apply(effect)
                }
                None => vec![],
            },
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.kind != KeyEventKind::Press {
            return vec![];
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return vec![];
        }

        let typing = self.screen == Screen::Tab && self.tab == Tab::Watchlist && self.watchlist.is_editing();
        if !typing {
            if let KeyCode::Char(c) = key.code {
                if c == 'q' {
                    self.quit = true;
                    return vec![];
                }
                if let Some(tab) = Tab::from_key(c) {
                    return self.switch_tab(tab);
                }
            }
        }

        let effect = match self.screen {
            Screen::Analysis => match self.analysis.as_mut() {
                Some(view) => view.handle_key(key),
                None => Effect::Back,
            },
            Screen::Detail => match self.detail.as_mut() {
                Some(view) => view.handle_key(key),
                None => Effect::Back,
            },
            Screen::Tab => match self.tab {
                Tab::Scan => self.scan.handle_key(key),
                Tab::Leaderboard => self.leaderboard.handle_key(key),
                Tab::Watchlist => self.watchlist.handle_key(key),
                Tab::Settings => self.settings.handle_key(key),
            },
        };
        self.apply(effect)
    }

    /// Leaves any trader screen. Data tabs reload on entry.
    fn switch_tab(&mut self, tab: Tab) -> Vec<Command> {
        let mut cmds = self.close_trader_screens();
        self.tab = tab;
        match tab {
            Tab::Leaderboard => cmds.push(self.leaderboard.load()),
            Tab::Watchlist => cmds.push(self.watchlist.load()),
            Tab::Scan | Tab::Settings => {}
        }
        cmds
    }

    fn close_trader_screens(&mut self) -> Vec<Command> {
        let mut cmds = vec![];
        if self.analysis.take().is_some_and(|a| a.is_busy()) {
            cmds.push(Command::Cancel(Slot::Analysis));
        }
        if self.detail.take().is_some() {
            cmds.push(Command::Cancel(Slot::Detail));
        }
        self.screen = Screen::Tab;
        cmds
    }

    fn apply(&mut self, effect: Effect) -> Vec<Command> {
        match effect {
            Effect::None => vec![],
            Effect::Run(cmd) => vec![cmd],
            Effect::OpenTrader(trader) => {
                let mut view = TraderDetailView::new(trader);
                let cmd = view.load();
                self.detail = Some(view);
                self.screen = Screen::Detail;
                vec![cmd]
            }
            Effect::Analyze(trader) => {
                let mut view = AnalysisView::new(trader);
                let cmd = view.start();
                self.analysis = Some(view);
                self.screen = Screen::Analysis;
                vec![cmd]
            }
            Effect::CycleTheme => {
                self.theme = self.theme.next();
                vec![Command::SaveSetting {
                    key: THEME_KEY.to_string(),
                    value: self.theme.name.to_string(),
                }]
            }
            Effect::Back => self.back(),
        }
    }

    fn back(&mut self) -> Vec<Command> {
        match self.screen {
            Screen::Analysis => {
                let mut cmds = vec![];
                if self.analysis.take().is_some_and(|a| a.is_busy()) {
                    cmds.push(Command::Cancel(Slot::Analysis));
                }
                self.screen = if self.detail.is_some() { Screen::Detail } else { Screen::Tab };
                cmds
            }
            Screen::Detail => {
                let mut cmds = self.close_trader_screens();
                // Watch state may have changed while the trader was open.
                match self.tab {
                    Tab::Watchlist => cmds.push(self.watchlist.load()),
                    Tab::Leaderboard => cmds.push(self.leaderboard.load()),
                    Tab::Scan | Tab::Settings => {}
                }
                cmds
            }
            Screen::Tab => vec![],
        }
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    pub fn render(&self, f: &mut Frame) {
        let area = f.area();
        f.render_widget(Block::default().style(self.theme.base()), area);

        // header | body | footer
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
            .split(area);

        self.render_tabs(f, chunks[0]);
        self.render_body(f, chunks[1]);
        self.render_footer(f, chunks[2]);
    }

    fn render_tabs(&self, f: &mut Frame, area: Rect) {
        let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.label()))
            .select(self.tab.index())
            .style(self.theme.tab_style())
            .highlight_style(self.theme.active_tab_style())
            .divider(Span::styled("│", self.theme.subtle()))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(self.theme.subtle())
                    .title(Span::styled(" POLYTRACKER ", self.theme.header_style())),
            );
        f.render_widget(tabs, area);
    }

    fn render_body(&self, f: &mut Frame, area: Rect) {
        let theme = &self.theme;
        match (self.screen, self.analysis.as_ref(), self.detail.as_ref()) {
            (Screen::Analysis, Some(view), _) => view.render(f, area, theme, self.tick),
            (Screen::Detail, _, Some(view)) => view.render(f, area, theme),
            _ => match self.tab {
                Tab::Scan => self.scan.render(f, area, theme, self.tick),
                Tab::Leaderboard => self.leaderboard.render(f, area, theme),
                Tab::Watchlist => self.watchlist.render(f, area, theme),
                Tab::Settings => self.settings.render(f, area, theme),
            },
        }
    }

    fn help(&self) -> Vec<(&'static str, &'static str)> {
        let mut keys = match (self.screen, self.analysis.as_ref(), self.detail.as_ref()) {
            (Screen::Analysis, Some(view), _) => view.help(),
            (Screen::Detail, _, Some(view)) => view.help(),
            _ => match self.tab {
                Tab::Scan => self.scan.help(),
                Tab::Leaderboard => self.leaderboard.help(),
                Tab::Watchlist => self.watchlist.help(),
                Tab::Settings => self.settings.help(),
            },
        };
        let typing = self.screen == Screen::Tab && self.tab == Tab::Watchlist && self.watchlist.is_editing();
        if !typing {
            keys.push(("1-4", "tabs"));
            keys.push(("q", "quit"));
        }
        keys
    }

    fn render_footer(&self, f: &mut Frame, area: Rect) {
        let key_style = self.theme.key_style();
        let mut spans = vec![Span::raw(" ")];
        for (key, label) in self.help() {
            spans.push(Span::styled(format!("[{key}] "), key_style));
            spans.push(Span::styled(format!("{label}  "), Style::default().fg(self.theme.gray)));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::{AnalysisOutcome, AnalysisResult};
    use crate::db::test_support::trader;
    use crate::tui::theme::{DRACULA, NORD};
    use crate::tui::views::test_support::{code, draw, key};
    use crate::tui::views::trader_detail::DetailData;
    use crate::types::{SortField, SortOrder};

    fn app() -> App {
        App::new(DRACULA, ScanView::new(10, 0), SettingsView::default())
    }

    fn press(app: &mut App, c: char) -> Vec<Command> {
        app.update(Msg::Key(key(c)))
    }

    fn with_traders(n: usize) -> App {
        let mut app = app();
        app.init();
        let traders = (0..n).map(|i| trader(&format!("0xt{i}"), 100.0 - i as f64)).collect();
        app.update(Msg::Leaderboard(LeaderboardEvent::Loaded(Ok((traders, n as i64)))));
        app
    }

    #[test]
    fn starts_on_leaderboard_and_loads_it() {
        let mut app = app();
        assert_eq!(app.tab, Tab::Leaderboard);
        let cmds = app.init();
        assert!(matches!(cmds.as_slice(), [Command::LoadLeaderboard(r)] if *r == Ranking::default()));
    }

    #[test]
    fn quit_keys() {
        let mut a = app();
        press(&mut a, 'q');
        assert!(a.should_quit());

        let mut b = app();
        b.update(Msg::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(b.should_quit());
    }

    #[test]
    fn number_keys_switch_tabs() {
        let mut app = app();
        assert!(press(&mut app, '1').is_empty());
        assert_eq!(app.tab, Tab::Scan);
        assert!(matches!(press(&mut app, '3').as_slice(), [Command::LoadWatchlist]));
        assert_eq!(app.tab, Tab::Watchlist);
        assert!(press(&mut app, '4').is_empty());
        assert_eq!(app.tab, Tab::Settings);
        assert!(matches!(press(&mut app, '2').as_slice(), [Command::LoadLeaderboard(_)]));
    }

    #[test]
    fn typing_a_note_does_not_quit_or_switch() {
        let mut app = app();
        press(&mut app, '3');
        app.update(Msg::Watchlist(WatchlistEvent::Loaded(Ok(vec![
            crate::tui::views::watchlist::WatchEntry {
                item: crate::types::WatchlistItem {
                    trader_address: "0xw".into(),
                    notes: String::new(),
                    created_at: chrono::Utc::now(),
                },
                trader: None,
                trades: 0,
            },
        ]))));
        press(&mut app, 'n');
        assert!(app.watchlist.is_editing());
        press(&mut app, 'q');
        press(&mut app, '2');
        assert!(!app.should_quit());
        assert_eq!(app.tab, Tab::Watchlist);

        let cmds = app.update(Msg::Key(code(KeyCode::Enter)));
        assert!(matches!(cmds.as_slice(), [Command::SaveNote { notes, .. }] if notes == "q2"));
    }

    #[test]
    fn sort_keys_reach_the_store() {
        let mut app = with_traders(3);
        let cmds = press(&mut app, 'v');
        match cmds.as_slice() {
            [Command::LoadLeaderboard(r)] => {
                assert_eq!((r.field, r.order), (SortField::Volume, SortOrder::Desc));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn detail_and_analysis_flow() {
        let mut app = with_traders(2);
        let cmds = app.update(Msg::Key(code(KeyCode::Enter)));
        assert_eq!(app.screen, Screen::Detail);
        assert!(matches!(cmds.as_slice(), [Command::LoadTraderDetail(a)] if a == "0xt0"));

        app.update(Msg::Detail(DetailEvent::Loaded {
            address: "0xt0".into(),
            result: Ok(DetailData {
                trader: trader("0xt0", 100.0),
                trades: vec![],
                markets: HashMap::new(),
                watched: false,
                analyses: 0,
            }),
        }));

        let cmds = press(&mut app, 'a');
        assert_eq!(app.screen, Screen::Analysis);
        assert!(matches!(cmds.as_slice(), [Command::LoadAnalysisData(a)] if a == "0xt0"));

        let cmds = app.update(Msg::Analysis(AnalysisEvent::DataLoaded {
            address: "0xt0".into(),
            result: Ok((vec![], HashMap::new())),
        }));
        assert!(matches!(cmds.as_slice(), [Command::RunAnalysis { .. }]));

        // Leaving mid-analysis cancels the outstanding call.
        let cmds = app.update(Msg::Key(code(KeyCode::Esc)));
        assert!(matches!(cmds.as_slice(), [Command::Cancel(Slot::Analysis)]));
        assert_eq!(app.screen, Screen::Detail);
        assert!(app.analysis.is_none());

        let cmds = app.update(Msg::Key(code(KeyCode::Esc)));
        assert_eq!(app.screen, Screen::Tab);
        assert!(app.detail.is_none());
        assert!(matches!(
            cmds.as_slice(),
            [Command::Cancel(Slot::Detail), Command::LoadLeaderboard(_)]
        ));
    }

    #[test]
    fn late_results_for_closed_screens_are_dropped() {
        let mut app = with_traders(1);
        let cmds = app.update(Msg::Analysis(AnalysisEvent::Finished {
            address: "0xt0".into(),
            result: Ok(AnalysisOutcome::Complete(AnalysisResult {
                thesis: "x".into(),
                model: "m".into(),
                input_tokens: 1,
                output_tokens: 1,
                stop_reason: "end_turn".into(),
                created_at: chrono::Utc::now(),
            })),
        }));
        assert!(cmds.is_empty());
        assert_eq!(app.screen, Screen::Tab);
    }

    #[test]
    fn settings_theme_cycle_persists() {
        let mut app = app();
        press(&mut app, '4');
        let cmds = press(&mut app, 't');
        assert_eq!(app.theme, NORD);
        assert!(matches!(
            cmds.as_slice(),
            [Command::SaveSetting { key, value }] if key == "ui.theme" && value == "nord"
        ));
    }

    #[test]
    fn finished_scan_refreshes_leaderboard() {
        let mut app = app();
        press(&mut app, '1');
        assert!(matches!(
            app.update(Msg::Key(code(KeyCode::Enter))).as_slice(),
            [Command::RunScan]
        ));
        let cmds = app.update(Msg::Scan(ScanEvent::Finished(Ok(Default::default()))));
        assert!(matches!(cmds.as_slice(), [Command::LoadLeaderboard(_)]));
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut app = app();
        let mut release = key('q');
        release.kind = KeyEventKind::Release;
        app.update(Msg::Key(release));
        assert!(!app.should_quit());
    }

    #[test]
    fn command_slots() {
        assert_eq!(Command::LoadWatchlist.slot(), Some(Slot::Watchlist));
        assert_eq!(Command::RunScan.slot(), Some(Slot::Scan));
        assert_eq!(Command::RemoveWatch("a".into()).slot(), None);
        assert_eq!(Command::Cancel(Slot::Detail).slot(), Some(Slot::Detail));
    }

    #[test]
    fn full_frame_render() {
        let app = with_traders(3);
        let out = draw(80, 24, |f| app.render(f));
        assert!(out.contains("POLYTRACKER"));
        assert!(out.contains("2. Leaderboard"));
        assert!(out.contains("Sorted by: P&L ↓ | Page 1/1 | Total: 3 traders"));
        assert!(out.contains("[q] quit"));
    }

    #[test]
    fn quit_hint_fits_80_columns_on_every_tab() {
        let mut app = with_traders(3);
        for digit in ['1', '2', '3', '4'] {
            press(&mut app, digit);
            let out = draw(80, 24, |f| app.render(f));
            assert!(out.contains("[1-4] tabs  [q] quit"), "tab {digit}:\n{out}");
        }
    }
}
