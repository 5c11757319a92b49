//! One module per screen. Each view owns its state, turns keys and command
//! results into an [`Effect`], and renders itself into the area it is given.

pub mod analysis;
pub mod leaderboard;
pub mod scan;
pub mod settings;
pub mod trader_detail;
pub mod watchlist;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::tui::app::Command;
use crate::tui::theme::Theme;
use crate::types::Trader;

/// Tabs have nothing to back out of.
pub const TAB_RETRY_HINT: &str = "Press 'r' to retry";
pub const SCREEN_RETRY_HINT: &str = "Press 'r' to retry or 'esc' to go back";

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// What the app should do after a view handled a key or a result.
#[derive(Debug)]
pub enum Effect {
    None,
    Run(Command),
    OpenTrader(Trader),
    Analyze(Trader),
    CycleTheme,
    Back,
}

pub fn spinner(tick: u64) -> &'static str {
    SPINNER[(tick % SPINNER.len() as u64) as usize]
}

pub fn is_down(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Down | KeyCode::Char('j'))
}

pub fn is_up(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Up | KeyCode::Char('k'))
}

pub fn is_back(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Esc | KeyCode::Backspace)
}

/// Move a table selection one row, staying inside `len`.
pub fn step(selected: Option<usize>, len: usize, down: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let next = match (selected, down) {
        (None, _) => 0,
        (Some(i), true) => (i + 1).min(len - 1),
        (Some(i), false) => i.saturating_sub(1),
    };
    Some(next)
}

pub fn panel(title: &str, theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_style())
        .title(Span::styled(format!(" {title} "), theme.title_style()))
}

pub fn render_error(f: &mut Frame, area: Rect, message: &str, hint: &str, theme: &Theme) {
    let lines = vec![
        Line::from(Span::styled("Error", theme.error_style().add_modifier(Modifier::BOLD))),
        Line::default(),
        Line::from(Span::styled(message.to_string(), theme.error_style())),
        Line::default(),
        Line::from(Span::styled(hint.to_string(), theme.subtle())),
    ];
    let block = panel("ERROR", theme).border_style(theme.error_style());
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

pub fn render_loading(f: &mut Frame, area: Rect, message: &str, tick: u64, theme: &Theme) {
    let lines = vec![
        Line::default(),
        Line::from(vec![
            Span::styled(spinner(tick), theme.highlight()),
            Span::raw(" "),
            Span::styled(message.to_string(), theme.tab_style()),
        ]),
        Line::default(),
        Line::from(Span::styled("This may take a moment...", theme.subtle())),
    ];
    f.render_widget(Paragraph::new(lines).block(panel("WORKING", theme)), area);
}

#[cfg(test)]
pub(crate) mod test_support {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{backend::TestBackend, Frame, Terminal};

    pub fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn code(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    /// Draw once into an off-screen buffer and return its text, row by row.
    pub fn draw<F>(width: u16, height: u16, render: F) -> String
    where
        F: FnOnce(&mut Frame),
    {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(render).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }
}
