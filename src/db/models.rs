//! Row types matching the schema in `db/mod.rs`.
//! Each converts into its domain type; enum columns that fail to parse are reported
//! as decode errors instead of being silently defaulted.
use sqlx::FromRow;

use super::from_millis;
use crate::types::{Analysis, Market, MarketSnapshot, Trade, Trader, WatchlistItem};

#[derive(Debug, FromRow)]
pub struct TraderRow {
    pub address: String,
    pub username: Option<String>,
    pub win_rate: f64,
    pub profit_loss: f64,
    pub roi: f64,
    pub volume: f64,
    pub last_scanned: i64,
}

impl From<TraderRow> for Trader {
    fn from(r: TraderRow) -> Self {
        Trader {
            address: r.address,
            username: r.username.filter(|u| !u.is_empty()),
            win_rate: r.win_rate,
            profit_loss: r.profit_loss,
            roi: r.roi,
            volume: r.volume,
            last_scanned: from_millis(r.last_scanned),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct TradeRow {
    pub id: String,
    pub trader_id: String,
    pub market_id: String,
    #[sqlx(rename = "type")]
    pub trade_type: String,
    pub side: String,
    pub price: f64,
    pub size: f64,
    pub timestamp: i64,
}

impl TryFrom<TradeRow> for Trade {
    type Error = sqlx::Error;

    fn try_from(r: TradeRow) -> Result<Self, Self::Error> {
        Ok(Trade {
            trade_type: r.trade_type.parse().map_err(decode_err)?,
            side: r.side.parse().map_err(decode_err)?,
            id: r.id,
            trader_address: r.trader_id,
            market_id: r.market_id,
            price: r.price,
            size: r.size,
            timestamp: from_millis(r.timestamp),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct MarketRow {
    pub id: String,
    pub question: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub ends_at: Option<i64>,
    pub status: String,
}

impl TryFrom<MarketRow> for Market {
    type Error = sqlx::Error;

    fn try_from(r: MarketRow) -> Result<Self, Self::Error> {
        Ok(Market {
            status: r.status.parse().map_err(decode_err)?,
            id: r.id,
            question: r.question,
            description: r.description,
            category: r.category,
            ends_at: r.ends_at.map(from_millis),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub market_id: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub timestamp: i64,
}

impl From<SnapshotRow> for MarketSnapshot {
    fn from(r: SnapshotRow) -> Self {
        MarketSnapshot {
            id: Some(r.id),
            market_id: r.market_id,
            yes_price: r.yes_price,
            no_price: r.no_price,
            timestamp: from_millis(r.timestamp),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AnalysisRow {
    pub id: i64,
    pub trader_id: String,
    pub thesis: String,
    pub created_at: i64,
}

impl From<AnalysisRow> for Analysis {
    fn from(r: AnalysisRow) -> Self {
        Analysis {
            id: r.id,
            trader_address: r.trader_id,
            thesis: r.thesis,
            created_at: from_millis(r.created_at),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct WatchlistRow {
    pub trader_id: String,
    pub notes: String,
    pub created_at: i64,
}

impl From<WatchlistRow> for WatchlistItem {
    fn from(r: WatchlistRow) -> Self {
        WatchlistItem {
            trader_address: r.trader_id,
            notes: r.notes,
            created_at: from_millis(r.created_at),
        }
    }
}

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}
