use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::{is_down, is_up, panel, render_error, step, Effect, TAB_RETRY_HINT};
use crate::tui::app::Command;
use crate::tui::format::{format_date, format_pct, format_pnl, short_address, truncate};
use crate::tui::theme::Theme;
use crate::types::{Trader, WatchlistItem};

const NOTE_LIMIT: usize = 200;

/// A watchlist row joined with the trader it points at, when that row exists.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEntry {
    pub item: WatchlistItem,
    pub trader: Option<Trader>,
    /// Stored trades for the address.
    pub trades: i64,
}

#[derive(Debug)]
pub enum WatchlistEvent {
    Loaded(Result<Vec<WatchEntry>, String>),
    /// Address that left the list.
    Removed(Result<String, String>),
    /// Address and its new note.
    NoteSaved(Result<(String, String), String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NoteEditor {
    address: String,
    input: String,
}

#[derive(Debug, Default)]
pub struct WatchlistView {
    entries: Vec<WatchEntry>,
    selected: Option<usize>,
    editing: Option<NoteEditor>,
    loading: bool,
    error: Option<String>,
    status: Option<String>,
}

impl WatchlistView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self) -> Command {
        self.loading = true;
        Command::LoadWatchlist
    }

    /// While a note is being typed every key belongs to the input.
    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    fn selected_entry(&self) -> Option<&WatchEntry> {
        self.selected.and_then(|i| self.entries.get(i))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Effect {
        if let Some(editor) = self.editing.as_mut() {
            match key.code {
                KeyCode::Esc => self.editing = None,
                KeyCode::Enter => {
                    let NoteEditor { address, input } = editor.clone();
                    self.editing = None;
                    return Effect::Run(Command::SaveNote {
                        address,
                        notes: input.trim().to_string(),
                    });
                }
                KeyCode::Backspace => {
                    editor.input.pop();
                }
                KeyCode::Char(c) if editor.input.chars().count() < NOTE_LIMIT => editor.input.push(c),
                _ => {}
            }
            return Effect::None;
        }

        if self.error.is_some() && key.code == KeyCode::Char('r') {
            return Effect::Run(self.load());
        }
        if is_down(&key) || is_up(&key) {
            self.selected = step(self.selected, self.entries.len(), is_down(&key));
            return Effect::None;
        }

        let Some(entry) = self.selected_entry().cloned() else {
            return Effect::None;
        };
        match key.code {
            KeyCode::Enter => match entry.trader {
                Some(t) => Effect::OpenTrader(t),
                None => {
                    self.status = Some("No stored stats for this trader yet".to_string());
                    Effect::None
                }
            },
            KeyCode::Char('d') => Effect::Run(Command::RemoveWatch(entry.item.trader_address)),
            KeyCode::Char('n') => {
                self.editing = Some(NoteEditor {
                    address: entry.item.trader_address,
                    input: entry.item.notes,
                });
                Effect::None
            }
            _ => Effect::None,
        }
    }

    pub fn handle_event(&mut self, event: WatchlistEvent) -> Effect {
        match event {
            WatchlistEvent::Loaded(Ok(entries)) => {
                self.loading = false;
                self.error = None;
                self.entries = entries;
                self.clamp_selection();
            }
            WatchlistEvent::Loaded(Err(e)) => {
                self.loading = false;
                self.error = Some(e);
            }
            WatchlistEvent::Removed(Ok(address)) => {
                self.entries.retain(|e| e.item.trader_address != address);
                self.clamp_selection();
                self.status = Some(format!("Removed {}", short_address(&address)));
            }
            WatchlistEvent::NoteSaved(Ok((address, notes))) => {
                if let Some(e) = self.entries.iter_mut().find(|e| e.item.trader_address == address) {
                    e.item.notes = notes;
                }
                self.status = Some("Note saved".to_string());
            }
            WatchlistEvent::Removed(Err(e)) | WatchlistEvent::NoteSaved(Err(e)) => {
                self.status = Some(format!("Error: {e}"));
            }
        }
        Effect::None
    }

    fn clamp_selection(&mut self) {
        self.selected = match self.entries.len() {
            0 => None,
            n => Some(self.selected.unwrap_or(0).min(n - 1)),
        };
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        if self.is_editing() {
            vec![("enter", "save note"), ("esc", "cancel")]
        } else {
            vec![
                ("j/k", "select"),
                ("enter", "details"),
                ("d", "remove"),
                ("n", "edit note"),
            ]
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        if let Some(err) = &self.error {
            render_error(f, area, err, TAB_RETRY_HINT, theme);
            return;
        }

        let editor_height = if self.editing.is_some() { 5 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(editor_height),
            ])
            .split(area);

        let mut header = vec![Span::styled(
            format!("Watching {} traders", self.entries.len()),
            theme.subtle(),
        )];
        if let Some(status) = &self.status {
            header.push(Span::styled(format!("  {status}"), theme.highlight()));
        }
        f.render_widget(Paragraph::new(Line::from(header)), chunks[0]);

        if self.entries.is_empty() {
            let empty = Paragraph::new(vec![
                Line::default(),
                Line::from(Span::styled("No traders in watchlist.", theme.subtle())),
                Line::default(),
                Line::from(Span::styled(
                    "Open a trader from the Leaderboard (2) and press 'w' to watch them.",
                    theme.subtle(),
                )),
            ])
            .block(panel("WATCHLIST", theme));
            f.render_widget(empty, chunks[1]);
        } else {
            self.render_table(f, chunks[1], theme);
        }

        if let Some(editor) = &self.editing {
            let lines = vec![
                Line::from(vec![
                    Span::styled(editor.input.clone(), theme.tab_style()),
                    Span::styled("█", theme.highlight()),
                ]),
                Line::default(),
                Line::from(Span::styled("Enter: save | Esc: cancel", theme.subtle())),
            ];
            f.render_widget(Paragraph::new(lines).block(panel("EDIT NOTE", theme)), chunks[2]);
        }
    }

    fn render_table(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let header_cells = ["Address", "Username", "Win %", "P&L", "Trades", "Notes", "Added"]
            .iter()
            .map(|h| Cell::from(*h).style(theme.table_header()));
        let header = Row::new(header_cells).height(1);

        let rows: Vec<Row> = self
            .entries
            .iter()
            .map(|e| {
                let (username, win, pnl) = match &e.trader {
                    Some(t) => (
                        t.username.clone().unwrap_or_else(|| "-".to_string()),
                        Cell::from(format_pct(t.win_rate)).style(theme.win_rate(t.win_rate)),
                        Cell::from(format_pnl(t.profit_loss)).style(theme.signed(t.profit_loss)),
                    ),
                    None => ("-".to_string(), Cell::from("-"), Cell::from("-")),
                };
                let notes = if e.item.notes.is_empty() {
                    "-".to_string()
                } else {
                    truncate(&e.item.notes, 30)
                };
                Row::new(vec![
                    Cell::from(short_address(&e.item.trader_address)),
                    Cell::from(username),
                    win,
                    pnl,
                    Cell::from(e.trades.to_string()),
                    Cell::from(notes),
                    Cell::from(format_date(e.item.created_at)).style(theme.subtle()),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(14),
                Constraint::Length(16),
                Constraint::Length(8),
                Constraint::Length(13),
                Constraint::Length(7),
                Constraint::Min(10),
                Constraint::Length(9),
            ],
        )
        .header(header)
        .block(panel("WATCHLIST", theme))
        .row_highlight_style(theme.selected_row());

        let mut state = TableState::default().with_selected(self.selected);
        f.render_stateful_widget(table, area, &mut state);
    }
}
