use std::collections::HashMap;
use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use super::{is_back, is_down, is_up, panel, render_error, render_loading, Effect, SCREEN_RETRY_HINT};
use crate::claude::AnalysisOutcome;
use crate::tui::app::Command;
use crate::tui::format::long_address;
use crate::tui::theme::Theme;
use crate::types::{Market, Trade, Trader};

/// Deadline for the model call from the interactive UI.
pub const ANALYSIS_TIMEOUT_SECS: u64 = 120;

#[derive(Debug)]
pub enum AnalysisEvent {
    DataLoaded {
        address: String,
        result: Result<(Vec<Trade>, HashMap<String, Market>), String>,
    },
    Finished {
        address: String,
        result: Result<AnalysisOutcome, String>,
    },
    Saved {
        address: String,
        result: Result<PathBuf, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Fetching,
    Analyzing,
    Complete(AnalysisOutcome),
    Failed(String),
}

#[derive(Debug)]
pub struct AnalysisView {
    trader: Trader,
    pub state: AnalysisState,
    scroll: u16,
    saved: Option<String>,
}

impl AnalysisView {
    pub fn new(trader: Trader) -> Self {
        Self {
            trader,
            state: AnalysisState::Fetching,
            scroll: 0,
            saved: None,
        }
    }

    /// Reset to the first step and ask for the trader's stored history.
    pub fn start(&mut self) -> Command {
        self.state = AnalysisState::Fetching;
        self.scroll = 0;
        self.saved = None;
        Command::LoadAnalysisData(self.trader.address.clone())
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, AnalysisState::Fetching | AnalysisState::Analyzing)
    }

    fn thesis(&self) -> Option<&str> {
        match &self.state {
            AnalysisState::Complete(outcome) => Some(outcome.result().thesis.as_str()),
            _ => None,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Effect {
        if is_back(&key) {
            return Effect::Back;
        }
        match (&self.state, key.code) {
            (AnalysisState::Complete(_) | AnalysisState::Failed(_), KeyCode::Char('r')) => Effect::Run(self.start()),
            (AnalysisState::Complete(outcome), KeyCode::Char('s')) => Effect::Run(Command::SaveThesis {
                trader: self.trader.clone(),
                thesis: outcome.result().thesis.clone(),
            }),
            (AnalysisState::Complete(_), _) if is_down(&key) => {
                let max = self.body(&Theme::default()).len().saturating_sub(1) as u16;
                self.scroll = (self.scroll + 1).min(max);
                Effect::None
            }
            (AnalysisState::Complete(_), _) if is_up(&key) => {
                self.scroll = self.scroll.saturating_sub(1);
                Effect::None
            }
            _ => Effect::None,
        }
    }

    pub fn handle_event(&mut self, event: AnalysisEvent) -> Effect {
        match event {
            AnalysisEvent::DataLoaded { address, result } if address == self.trader.address => match result {
                Ok((trades, markets)) => {
                    self.state = AnalysisState::Analyzing;
                    Effect::Run(Command::RunAnalysis {
                        trader: self.trader.clone(),
                        trades,
                        markets,
                    })
                }
                Err(e) => {
                    self.state = AnalysisState::Failed(format!("failed to load trades: {e}"));
                    Effect::None
                }
            },
            AnalysisEvent::Finished { address, result } if address == self.trader.address => {
                self.state = match result {
                    Ok(outcome) => AnalysisState::Complete(outcome),
                    Err(e) => AnalysisState::Failed(e),
                };
                self.scroll = 0;
                Effect::None
            }
            AnalysisEvent::Saved { address, result } if address == self.trader.address => {
                self.saved = Some(match result {
                    Ok(path) => format!("Saved to: {}", path.display()),
                    Err(e) => format!("Save failed: {e}"),
                });
                Effect::None
            }
            _ => Effect::None,
        }
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        match self.state {
            AnalysisState::Fetching | AnalysisState::Analyzing => vec![("esc", "cancel")],
            AnalysisState::Failed(_) => vec![("r", "retry"), ("esc", "back")],
            AnalysisState::Complete(_) => vec![("s", "save"), ("r", "retry"), ("j/k", "scroll"), ("esc", "back")],
        }
    }

    fn body(&self, theme: &Theme) -> Vec<Line<'static>> {
        let Some(thesis) = self.thesis() else {
            return Vec::new();
        };
        let mut lines = Vec::new();
        if let AnalysisState::Complete(outcome) = &self.state {
            if outcome.is_truncated() {
                lines.push(Line::from(Span::styled(
                    "⚠ The response hit the token limit. The thesis below may be cut off.",
                    theme.error_style().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::default());
            }
        }
        lines.extend(render_markdown(thesis, theme));
        if let AnalysisState::Complete(outcome) = &self.state {
            let r = outcome.result();
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!("Model: {} | Tokens: {} in / {} out", r.model, r.input_tokens, r.output_tokens),
                theme.subtle(),
            )));
        }
        lines
    }

    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme, tick: u64) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
            .split(area);

        let header = Line::from(Span::styled(
            format!(" ANALYSIS: {} ", long_address(&self.trader.address)),
            theme.header_style(),
        ));
        f.render_widget(Paragraph::new(header), chunks[0]);

        match &self.state {
            AnalysisState::Fetching => render_loading(f, chunks[1], "Fetching trader data...", tick, theme),
            AnalysisState::Analyzing => render_loading(f, chunks[1], "Analyzing with Claude AI...", tick, theme),
            AnalysisState::Failed(e) => render_error(f, chunks[1], e, SCREEN_RETRY_HINT, theme),
            AnalysisState::Complete(_) => {
                let paragraph = Paragraph::new(self.body(theme))
                    .wrap(Wrap { trim: false })
                    .scroll((self.scroll, 0))
                    .block(panel("THESIS", theme));
                f.render_widget(paragraph, chunks[1]);
            }
        }

        if let Some(saved) = &self.saved {
            f.render_widget(Paragraph::new(Span::styled(saved.clone(), theme.highlight())), chunks[2]);
        }
    }
}

/// Light Markdown styling: headings, list markers and `**bold**` runs.
pub fn render_markdown(text: &str, theme: &Theme) -> Vec<Line<'static>> {
    let heading = Style::default().fg(theme.primary).add_modifier(Modifier::BOLD);
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();

    for raw in text.lines() {
        let trimmed = raw.trim();
        if let Some(h) = trimmed
            .strip_prefix("### ")
            .map(|h| (h, bold))
            .or_else(|| trimmed.strip_prefix("## ").map(|h| (h, heading)))
            .or_else(|| trimmed.strip_prefix("# ").map(|h| (h, heading)))
        {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(h.0.to_string(), h.1)));
            continue;
        }

        let marker_len = list_marker_len(trimmed);
        if marker_len > 0 {
            let (marker, rest) = trimmed.split_at(marker_len);
            let mut spans = vec![Span::styled(marker.to_string(), theme.highlight())];
            spans.extend(bold_spans(rest, bold));
            lines.push(Line::from(spans));
            continue;
        }

        lines.push(Line::from(bold_spans(raw, bold)));
    }
    lines
}

/// Length of a leading `- `, `* ` or `1. ` style marker, else 0.
fn list_marker_len(line: &str) -> usize {
    if line.starts_with("- ") || line.starts_with("* ") {
        return 2;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && line[digits..].starts_with(". ") {
        digits + 2
    } else {
        0
    }
}

fn bold_spans(line: &str, bold: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find("**") {
        let Some(len) = rest[start + 2..].find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(rest[start + 2..start + 2 + len].to_string(), bold));
        rest = &rest[start + 2 + len + 2..];
    }
    if !rest.is_empty() || spans.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }
    spans
}
