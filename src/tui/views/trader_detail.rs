use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{is_back, is_down, is_up, panel, render_error, Effect, SCREEN_RETRY_HINT};
use crate::tui::app::Command;
use crate::tui::format::{
    format_pct, format_pnl, format_short_time, format_timestamp, format_volume, long_address, truncate,
};
use crate::tui::theme::Theme;
use crate::types::{Market, Trade, TradeType, Trader};

/// Trades listed before `t` expands to the full history.
pub const RECENT_TRADES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct DetailData {
    pub trader: Trader,
    pub trades: Vec<Trade>,
    pub markets: HashMap<String, Market>,
    pub watched: bool,
    /// Stored theses for this trader.
    pub analyses: usize,
}

#[derive(Debug)]
pub enum DetailEvent {
    Loaded {
        address: String,
        result: Result<DetailData, String>,
    },
    /// New watch state after a toggle.
    WatchChanged {
        address: String,
        result: Result<bool, String>,
    },
}

#[derive(Debug)]
pub struct TraderDetailView {
    trader: Trader,
    trades: Vec<Trade>,
    markets: HashMap<String, Market>,
    watched: bool,
    analyses: usize,
    loading: bool,
    error: Option<String>,
    status: Option<String>,
    show_all: bool,
    scroll: u16,
}

impl TraderDetailView {
    pub fn new(trader: Trader) -> Self {
        Self {
            trader,
            trades: Vec::new(),
            markets: HashMap::new(),
            watched: false,
            analyses: 0,
            loading: false,
            error: None,
            status: None,
            show_all: false,
            scroll: 0,
        }
    }

    pub fn load(&mut self) -> Command {
        self.loading = true;
        self.error = None;
        Command::LoadTraderDetail(self.trader.address.clone())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Effect {
        if is_back(&key) {
            return Effect::Back;
        }
        if self.error.is_some() {
            return match key.code {
                KeyCode::Char('r') => Effect::Run(self.load()),
                _ => Effect::None,
            };
        }
        if is_down(&key) {
            let max = self.body(&Theme::default()).len().saturating_sub(1) as u16;
            self.scroll = (self.scroll + 1).min(max);
            return Effect::None;
        }
        if is_up(&key) {
            self.scroll = self.scroll.saturating_sub(1);
            return Effect::None;
        }
        match key.code {
            KeyCode::Char('t') => {
                self.show_all = !self.show_all;
                self.scroll = 0;
                Effect::None
            }
            KeyCode::Char('w') => Effect::Run(Command::SetWatched {
                address: self.trader.address.clone(),
                watched: !self.watched,
            }),
            KeyCode::Char('a') => Effect::Analyze(self.trader.clone()),
            _ => Effect::None,
        }
    }

    pub fn handle_event(&mut self, event: DetailEvent) -> Effect {
        match event {
            DetailEvent::Loaded { address, result } if address == self.trader.address => {
                self.loading = false;
                match result {
                    Ok(data) => {
                        self.trader = data.trader;
                        self.trades = data.trades;
                        self.markets = data.markets;
                        self.watched = data.watched;
                        self.analyses = data.analyses;
                    }
                    Err(e) => self.error = Some(e),
                }
            }
            DetailEvent::WatchChanged { address, result } if address == self.trader.address => match result {
                Ok(watched) => {
                    self.watched = watched;
                    self.status = Some(if watched {
                        "Added to watchlist".to_string()
                    } else {
                        "Removed from watchlist".to_string()
                    });
                }
                Err(e) => self.status = Some(format!("Watchlist update failed: {e}")),
            },
            _ => {}
        }
        Effect::None
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        if self.error.is_some() {
            return vec![("r", "retry"), ("esc", "back")];
        }
        vec![
            ("esc", "back"),
            ("a", "analyze"),
            ("w", if self.watched { "unwatch" } else { "watch" }),
            ("t", if self.show_all { "recent trades" } else { "all trades" }),
            ("j/k", "scroll"),
        ]
    }

    fn body(&self, theme: &Theme) -> Vec<Line<'static>> {
        let t = &self.trader;
        let label = |s: &str| Span::styled(format!("{s:<12}"), theme.highlight());

        let mut lines = vec![
            Line::from(vec![label("Address:"), Span::raw(long_address(&t.address))]),
            Line::from(vec![label("Full:"), Span::styled(t.address.clone(), theme.subtle())]),
            Line::from(vec![
                label("Username:"),
                Span::raw(t.username.clone().unwrap_or_else(|| "(no username)".to_string())),
            ]),
            Line::from(vec![label("Scanned:"), Span::raw(format_timestamp(t.last_scanned))]),
            Line::default(),
            Line::from(Span::styled(" STATISTICS ", theme.header_style())),
            Line::from(vec![
                label("Win Rate:"),
                Span::styled(format_pct(t.win_rate), theme.win_rate(t.win_rate)),
            ]),
            Line::from(vec![
                label("P&L:"),
                Span::styled(format_pnl(t.profit_loss), theme.signed(t.profit_loss)),
            ]),
            Line::from(vec![label("ROI:"), Span::styled(format_pct(t.roi), theme.signed(t.roi))]),
            Line::from(vec![label("Volume:"), Span::styled(format_volume(t.volume), theme.highlight())]),
            Line::from(vec![label("Trades:"), Span::styled(self.trades.len().to_string(), theme.highlight())]),
            Line::from(vec![label("Analyses:"), Span::styled(self.analyses.to_string(), theme.highlight())]),
            Line::default(),
        ];

        let title = if self.show_all { " ALL TRADES " } else { " RECENT TRADES " };
        lines.push(Line::from(Span::styled(title, theme.header_style())));

        if self.loading && self.trades.is_empty() {
            lines.push(Line::from(Span::styled("  Loading trades...", theme.subtle())));
            return lines;
        }
        if self.trades.is_empty() {
            lines.push(Line::from(Span::styled("  No trades found", theme.subtle())));
            return lines;
        }

        lines.push(Line::from(Span::styled(
            format!("{:<12} {:<5} {:<4} {:>8} {:>10}  {}", "Date", "Type", "Side", "Price", "Size", "Market"),
            theme.subtle().add_modifier(Modifier::BOLD),
        )));

        let limit = if self.show_all { self.trades.len() } else { RECENT_TRADES };
        for trade in self.trades.iter().take(limit) {
            let market = match self.markets.get(&trade.market_id) {
                Some(m) => truncate(&m.question, 40),
                None => truncate(&trade.market_id, 12),
            };
            let type_style = match trade.trade_type {
                TradeType::Buy => Style::default().fg(theme.profit),
                TradeType::Sell => Style::default().fg(theme.loss),
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{:<12} ", format_short_time(trade.timestamp)), theme.subtle()),
                Span::styled(format!("{:<5} ", trade.trade_type.to_string()), type_style),
                Span::raw(format!("{:<4} ", trade.side.to_string())),
                Span::raw(format!("{:>8} ", format!("${:.3}", trade.price))),
                Span::raw(format!("{:>10}  ", format!("{:.2}", trade.size))),
                Span::raw(market),
            ]));
        }

        if !self.show_all && self.trades.len() > RECENT_TRADES {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!(
                    "  ... and {} more trades (press 't' to show all)",
                    self.trades.len() - RECENT_TRADES
                ),
                theme.subtle(),
            )));
        }
        lines
    }

    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        if let Some(err) = &self.error {
            render_error(f, area, err, SCREEN_RETRY_HINT, theme);
            return;
        }

        let mut title = "TRADER PROFILE".to_string();
        if self.watched {
            title.push_str(" [WATCHING]");
        }
        let mut block = panel(&title, theme);
        if let Some(status) = &self.status {
            block = block.title_bottom(Line::from(Span::styled(format!(" {status} "), theme.subtle())));
        }

        let paragraph = Paragraph::new(self.body(theme))
            .block(block)
            .scroll((self.scroll, 0));
        f.render_widget(paragraph, area);
    }
}
