use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table},
    Frame,
};

use super::{panel, Effect};
use crate::config::{mask_secret, AppConfig};
use crate::tui::theme::Theme;

#[derive(Debug)]
pub enum SettingsEvent {
    /// The theme name that was persisted.
    Saved(Result<String, String>),
}

/// Read-only view of the effective configuration plus the theme switcher.
#[derive(Debug, Default)]
pub struct SettingsView {
    rows: Vec<(String, String)>,
    status: Option<String>,
}

impl SettingsView {
    pub fn new(rows: Vec<(String, String)>) -> Self {
        Self { rows, status: None }
    }

    /// Secrets are masked; everything else is shown as loaded.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let source = cfg
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string());
        let rows = vec![
            ("Config file", source),
            ("Database", cfg.database.path.clone()),
            ("Gamma API", cfg.polymarket.gamma_url.clone()),
            ("CLOB API", cfg.polymarket.clob_url.clone()),
            (
                "Rate limit",
                format!("{}/s (burst {})", cfg.polymarket.rate_limit, cfg.polymarket.burst),
            ),
            ("Timeout", format!("{}s", cfg.polymarket.timeout_secs)),
            ("Polymarket key", mask_secret(&cfg.polymarket.api_key)),
            ("Claude endpoint", cfg.claude.endpoint.clone()),
            ("Claude API key", mask_secret(&cfg.claude.api_key)),
            ("Export dir", cfg.export.dir.clone()),
            ("Scan markets", cfg.scan.market_limit.to_string()),
            ("Log level", cfg.log.level.clone()),
        ];
        Self::new(rows.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Effect {
        match key.code {
            KeyCode::Char('t') => Effect::CycleTheme,
            _ => Effect::None,
        }
    }

    pub fn handle_event(&mut self, event: SettingsEvent) -> Effect {
        let SettingsEvent::Saved(result) = event;
        self.status = Some(match result {
            Ok(name) => format!("Theme '{name}' saved"),
            Err(e) => format!("Could not save theme: {e}"),
        });
        Effect::None
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        vec![("t", "cycle theme")]
    }

    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(5)])
            .split(area);

        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|(k, v)| {
                Row::new(vec![
                    Cell::from(k.clone()).style(theme.highlight()),
                    Cell::from(v.clone()),
                ])
            })
            .collect();
        let table = Table::new(rows, [Constraint::Length(18), Constraint::Min(10)])
            .block(panel("SETTINGS", theme));
        f.render_widget(table, chunks[0]);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Theme: ", theme.highlight()),
                Span::styled(theme.title, theme.title_style()),
                Span::styled(format!("  ({})", Theme::names().join(", ")), theme.subtle()),
            ]),
            Line::from(vec![
                Span::raw("Press "),
                Span::styled("t", theme.key_style()),
                Span::raw(" to switch. The choice is remembered."),
            ]),
        ];
        if let Some(status) = &self.status {
            lines.push(Line::from(Span::styled(status.clone(), theme.subtle())));
        }
        f.render_widget(Paragraph::new(lines).block(panel("THEME", theme)), chunks[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::theme::NORD;
    use crate::tui::views::test_support::{draw, key};

    #[test]
    fn t_cycles_theme() {
        let mut v = SettingsView::default();
        assert!(matches!(v.handle_key(key('t')), Effect::CycleTheme));
        assert!(matches!(v.handle_key(key('x')), Effect::None));
    }

    #[test]
    fn renders_rows_and_theme() {
        let mut v = SettingsView::new(vec![
            ("Database".into(), "polytracker.db".into()),
            ("Claude API key".into(), mask_secret("sk-ant-1234567890")),
        ]);
        v.handle_event(SettingsEvent::Saved(Ok("nord".into())));
        let out = draw(100, 16, |f| {
            let area = f.area();
            v.render(f, area, &NORD)
        });
        assert!(out.contains("polytracker.db"));
        assert!(out.contains("sk-a...7890"));
        assert!(!out.contains("1234567890"));
        assert!(out.contains("Theme: Nord"));
        assert!(out.contains("Theme 'nord' saved"));
    }
}
