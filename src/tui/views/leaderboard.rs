use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::{is_down, is_up, panel, render_error, step, Effect, TAB_RETRY_HINT};
use crate::leaderboard::Ranking;
use crate::tui::app::Command;
use crate::tui::format::{format_pct, format_pnl, format_volume, short_address};
use crate::tui::theme::Theme;
use crate::types::{SortField, Trader};

#[derive(Debug)]
pub enum LeaderboardEvent {
    Loaded(Result<(Vec<Trader>, i64), String>),
}

#[derive(Debug, Default)]
pub struct LeaderboardView {
    pub ranking: Ranking,
    traders: Vec<Trader>,
    selected: Option<usize>,
    loading: bool,
    error: Option<String>,
}

impl LeaderboardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sort or page change goes back to the store.
    pub fn load(&mut self) -> Command {
        self.loading = true;
        Command::LoadLeaderboard(self.ranking)
    }

    pub fn selected_trader(&self) -> Option<&Trader> {
        self.selected.and_then(|i| self.traders.get(i))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Effect {
        if self.error.is_some() && key.code == KeyCode::Char('r') {
            return Effect::Run(self.load());
        }
        if is_down(&key) || is_up(&key) {
            self.selected = step(self.selected, self.traders.len(), is_down(&key));
            return Effect::None;
        }
        match key.code {
            KeyCode::Char('w') => self.sort(SortField::WinRate),
            KeyCode::Char('p') => self.sort(SortField::ProfitLoss),
            KeyCode::Char('r') => self.sort(SortField::Roi),
            KeyCode::Char('v') => self.sort(SortField::Volume),
            KeyCode::PageDown | KeyCode::Right | KeyCode::Char('l') => {
                if self.ranking.next_page() {
                    Effect::Run(self.load())
                } else {
                    Effect::None
                }
            }
            KeyCode::PageUp | KeyCode::Left | KeyCode::Char('h') => {
                if self.ranking.prev_page() {
                    Effect::Run(self.load())
                } else {
                    Effect::None
                }
            }
            KeyCode::Enter => match self.selected_trader() {
                Some(t) => Effect::OpenTrader(t.clone()),
                None => Effect::None,
            },
            _ => Effect::None,
        }
    }

    fn sort(&mut self, field: SortField) -> Effect {
        self.ranking.select_sort(field);
        Effect::Run(self.load())
    }

    pub fn handle_event(&mut self, event: LeaderboardEvent) -> Effect {
        match event {
            LeaderboardEvent::Loaded(Ok((traders, total))) => {
                self.loading = false;
                self.error = None;
                let page = self.ranking.page;
                self.ranking.set_total(total);
                if self.ranking.page != page {
                    // The table shrank under us; fetch the page we clamped to.
                    return Effect::Run(self.load());
                }
                self.traders = traders;
                self.selected = if self.traders.is_empty() {
                    None
                } else {
                    Some(self.selected.unwrap_or(0).min(self.traders.len() - 1))
                };
                Effect::None
            }
            LeaderboardEvent::Loaded(Err(e)) => {
                self.loading = false;
                self.error = Some(e);
                Effect::None
            }
        }
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("j/k", "select"),
            ("enter", "details"),
            ("w/p/r/v", "sort"),
            ("←→", "page"),
        ]
    }

    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        if let Some(err) = &self.error {
            render_error(f, area, err, TAB_RETRY_HINT, theme);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        let mut header = vec![Span::styled(self.ranking.header(), theme.subtle())];
        if self.loading {
            header.push(Span::styled("  loading…", theme.highlight()));
        }
        f.render_widget(Paragraph::new(Line::from(header)), chunks[0]);

        if self.traders.is_empty() && !self.loading {
            let empty = Paragraph::new(vec![
                Line::default(),
                Line::from(Span::styled("No traders yet.", theme.subtle())),
                Line::from(Span::styled(
                    "Open the Scan tab (1) and press enter to discover active traders.",
                    theme.subtle(),
                )),
            ])
            .block(panel("LEADERBOARD", theme));
            f.render_widget(empty, chunks[1]);
            return;
        }

        let header_cells = ["#", "Address", "Username", "Win %", "P&L", "ROI %", "Volume"]
            .iter()
            .map(|h| Cell::from(*h).style(theme.table_header()));
        let header = Row::new(header_cells).height(1);

        let rows: Vec<Row> = self
            .traders
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Row::new(vec![
                    Cell::from(self.ranking.rank_of(i).to_string()).style(theme.subtle()),
                    Cell::from(short_address(&t.address)),
                    Cell::from(t.username.clone().unwrap_or_else(|| "-".to_string())),
                    Cell::from(format_pct(t.win_rate)).style(theme.win_rate(t.win_rate)),
                    Cell::from(format_pnl(t.profit_loss)).style(theme.signed(t.profit_loss)),
                    Cell::from(format_pct(t.roi)).style(theme.signed(t.roi)),
                    Cell::from(format_volume(t.volume)).style(theme.highlight()),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(5),
                Constraint::Length(14),
                Constraint::Min(10),
                Constraint::Length(8),
                Constraint::Length(13),
                Constraint::Length(9),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .block(panel("LEADERBOARD", theme))
        .row_highlight_style(theme.selected_row());

        let mut state = TableState::default().with_selected(self.selected);
        f.render_stateful_widget(table, chunks[1], &mut state);
    }
}
