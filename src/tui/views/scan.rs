use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use super::{panel, render_error, spinner, Effect, TAB_RETRY_HINT};
use crate::scanner::ScanReport;
use crate::tui::app::Command;
use crate::tui::theme::Theme;

#[derive(Debug)]
pub enum ScanEvent {
    Finished(Result<ScanReport, String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Done(ScanReport),
    Failed(String),
}

#[derive(Debug)]
pub struct ScanView {
    pub state: ScanState,
    market_limit: usize,
    min_trades: usize,
}

impl ScanView {
    pub fn new(market_limit: usize, min_trades: usize) -> Self {
        Self {
            state: ScanState::Idle,
            market_limit,
            min_trades,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ScanState::Running
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Effect {
        let start = match key.code {
            KeyCode::Enter | KeyCode::Char('s') => true,
            KeyCode::Char('r') => matches!(self.state, ScanState::Failed(_)),
            _ => false,
        };
        if !start || self.is_running() {
            return Effect::None;
        }
        self.state = ScanState::Running;
        Effect::Run(Command::RunScan)
    }

    pub fn handle_event(&mut self, event: ScanEvent) -> Effect {
        let ScanEvent::Finished(result) = event;
        self.state = match result {
            Ok(report) => ScanState::Done(report),
            Err(e) => ScanState::Failed(e),
        };
        Effect::None
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        match self.state {
            ScanState::Running => vec![],
            ScanState::Failed(_) => vec![("r", "retry")],
            _ => vec![("enter/s", "start scan")],
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme, tick: u64) {
        if let ScanState::Failed(err) = &self.state {
            render_error(f, area, &format!("Scan failed: {err}"), TAB_RETRY_HINT, theme);
            return;
        }

        let mut lines = vec![
            Line::from(Span::styled(
                format!(
                    "Samples the {} most recent markets and records every address that traded in them.",
                    self.market_limit
                ),
                theme.tab_style(),
            )),
        ];
        if self.min_trades > 0 {
            lines.push(Line::from(Span::styled(
                format!("Only addresses with at least {} trades are kept.", self.min_trades),
                theme.subtle(),
            )));
        }
        lines.push(Line::default());

        match &self.state {
            ScanState::Idle => {
                lines.push(Line::from(vec![
                    Span::raw("Press "),
                    Span::styled("enter", theme.key_style()),
                    Span::raw(" to start a scan."),
                ]));
            }
            ScanState::Running => {
                lines.push(Line::from(vec![
                    Span::styled(spinner(tick), theme.highlight()),
                    Span::raw(" Scanning recent markets..."),
                ]));
            }
            ScanState::Done(r) => {
                lines.push(Line::from(Span::styled("Scan complete", theme.highlight())));
                lines.push(Line::default());
                for (label, value) in [
                    ("Markets scanned", r.markets_scanned),
                    ("Markets failed", r.markets_failed),
                    ("Trades seen", r.trades_seen),
                    ("Traders saved", r.traders_saved),
                    ("Traders failed", r.traders_failed),
                    ("Below min trades", r.traders_filtered),
                ] {
                    lines.push(Line::from(vec![
                        Span::styled(format!("  {label:<18}"), theme.subtle()),
                        Span::styled(value.to_string(), theme.tab_style()),
                    ]));
                }
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    "Press 2 for the leaderboard or enter to scan again.",
                    theme.subtle(),
                )));
            }
            ScanState::Failed(_) => {}
        }

        let paragraph = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(panel("SCAN", theme));
        f.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::views::test_support::{code, draw, key};

    #[test]
    fn enter_starts_once() {
        let mut v = ScanView::new(10, 0);
        assert!(matches!(v.handle_key(code(KeyCode::Enter)), Effect::Run(Command::RunScan)));
        assert!(v.is_running());
        assert!(matches!(v.handle_key(key('s')), Effect::None));
    }

    #[test]
    fn retry_only_after_failure() {
        let mut v = ScanView::new(10, 0);
        assert!(matches!(v.handle_key(key('r')), Effect::None));
        v.handle_key(key('s'));
        v.handle_event(ScanEvent::Finished(Err("http error: 502".into())));
        assert!(matches!(v.handle_key(key('r')), Effect::Run(Command::RunScan)));
    }

    #[test]
    fn report_is_rendered() {
        let mut v = ScanView::new(7, 2);
        v.handle_event(ScanEvent::Finished(Ok(ScanReport {
            markets_scanned: 6,
            markets_failed: 1,
            trades_seen: 120,
            traders_saved: 42,
            traders_failed: 0,
            traders_filtered: 3,
        })));
        let out = draw(100, 20, |f| {
            let area = f.area();
            v.render(f, area, &Theme::default(), 0)
        });
        assert!(out.contains("7 most recent markets"));
        assert!(out.contains("at least 2 trades"));
        assert!(out.contains("Scan complete"));
        assert!(out.contains("Traders saved     42"));
    }

    #[test]
    fn failure_shows_retry_hint() {
        let mut v = ScanView::new(10, 0);
        v.handle_event(ScanEvent::Finished(Err("http error: 502".into())));
        let out = draw(80, 10, |f| {
            let area = f.area();
            v.render(f, area, &Theme::default(), 0)
        });
        assert!(out.contains("Scan failed: http error: 502"));
        assert!(out.contains("Press 'r' to retry"));
        assert!(!out.contains("esc"));
    }
}
