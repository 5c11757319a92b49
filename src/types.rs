use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trader
// ---------------------------------------------------------------------------

/// An address observed trading, with aggregate statistics attached.
/// `win_rate` and `roi` are fractions (0.8 = 80%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trader {
    pub address: String,
    pub username: Option<String>,
    pub win_rate: f64,
    pub profit_loss: f64,
    pub roi: f64,
    pub volume: f64,
    pub last_scanned: DateTime<Utc>,
}

impl Trader {
    /// A freshly discovered trader with zeroed statistics.
    pub fn new(address: impl Into<String>, last_scanned: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            username: None,
            win_rate: 0.0,
            profit_loss: 0.0,
            roi: 0.0,
            volume: 0.0,
            last_scanned,
        }
    }

    pub fn display_name(&self) -> &str {
        match self.username.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.address,
        }
    }
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub trader_address: String,
    pub market_id: String,
    pub trade_type: TradeType,
    pub side: Outcome,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Notional value: price × size.
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            other => Err(format!("unknown trade type: {other:?}")),
        }
    }
}

/// Which outcome token a trade was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YES" => Ok(Outcome::Yes),
            "NO" => Ok(Outcome::No),
            other => Err(format!("unknown outcome: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: MarketStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
}

impl MarketStatus {
    pub fn from_closed_flag(closed: bool) -> Self {
        if closed {
            MarketStatus::Closed
        } else {
            MarketStatus::Active
        }
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketStatus::Active => "active",
            MarketStatus::Closed => "closed",
            MarketStatus::Resolved => "resolved",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MarketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "open" => Ok(MarketStatus::Active),
            "closed" => Ok(MarketStatus::Closed),
            "resolved" => Ok(MarketStatus::Resolved),
            other => Err(format!("unknown market status: {other:?}")),
        }
    }
}

/// A point-in-time price observation for a market's two outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: Option<i64>,
    pub market_id: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Analysis + watchlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: i64,
    pub trader_address: String,
    pub thesis: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub trader_address: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Leaderboard ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    ProfitLoss,
    WinRate,
    Roi,
    Volume,
}

impl SortField {
    /// Column name in the `traders` table. Only these fixed strings reach SQL.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::ProfitLoss => "profit_loss",
            SortField::WinRate => "win_rate",
            SortField::Roi => "roi",
            SortField::Volume => "volume",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortField::ProfitLoss => "P&L",
            SortField::WinRate => "Win Rate",
            SortField::Roi => "ROI",
            SortField::Volume => "Volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortOrder::Asc => "↑",
            SortOrder::Desc => "↓",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListTradersOptions {
    pub sort_by: SortField,
    pub order: SortOrder,
    /// `None` = no limit.
    pub limit: Option<i64>,
    pub offset: i64,
}
