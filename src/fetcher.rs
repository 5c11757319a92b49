use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::polymarket::{ClobTrade, GammaMarket, MarketClient};
use crate::types::{MarketSnapshot, Outcome, Trade};

/// A snapshot younger than this is reused instead of refetched.
pub const SNAPSHOT_MAX_AGE_SECS: i64 = 3600;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub trades_seen: usize,
    pub trades_saved: usize,
    pub trades_skipped: usize,
    pub markets_fetched: usize,
    pub snapshots_saved: usize,
}

/// Pulls one trader's history into the local store.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: MarketClient,
    db: Database,
}

impl Fetcher {
    pub fn new(client: MarketClient, db: Database) -> Self {
        Self { client, db }
    }

    /// Ingest every trade the API returns for `address`.
    ///
    /// Only the initial trade listing is fatal. Market lookups, trade saves and
    /// snapshot refreshes fail per trade: the failure is logged and the run moves on.
    pub async fn fetch_trader_history(&self, address: &str) -> Result<FetchReport> {
        let trades = self.client.get_account_trades(address).await?;
        info!(address, trades = trades.len(), "Fetched trader history");

        let mut report = FetchReport::default();
        let mut fetched: HashMap<String, GammaMarket> = HashMap::new();
        let mut volume = 0.0;

        for ct in &trades {
            report.trades_seen += 1;

            if let Err(e) = self.ensure_market(&ct.market_id, &mut fetched, &mut report).await {
                warn!(trade_id = %ct.id, market_id = %ct.market_id, "Skipping trade, market unavailable: {e}");
                report.trades_skipped += 1;
                continue;
            }

            let trade = match map_trade(address, ct) {
                Ok(t) => t,
                Err(e) => {
                    warn!(trade_id = %ct.id, "Skipping trade: {e}");
                    report.trades_skipped += 1;
                    continue;
                }
            };

            if let Err(e) = self.db.save_trade(&trade).await {
                warn!(trade_id = %trade.id, "Failed to save trade: {e}");
                report.trades_skipped += 1;
                continue;
            }
            report.trades_saved += 1;
            volume += trade.notional();

            match self.ensure_snapshot(&ct.market_id, &fetched).await {
                Ok(true) => report.snapshots_saved += 1,
                Ok(false) => {}
                Err(e) => warn!(market_id = %ct.market_id, "Snapshot refresh failed: {e}"),
            }
        }

        // Only observed activity earns a trader row.
        if report.trades_saved > 0 {
            if let Err(e) = self.db.touch_trader(address, volume, Utc::now()).await {
                warn!(address, "Failed to record trader: {e}");
            }
        }

        info!(
            address,
            saved = report.trades_saved,
            skipped = report.trades_skipped,
            markets = report.markets_fetched,
            snapshots = report.snapshots_saved,
            "Trader history ingested"
        );
        Ok(report)
    }

    /// Make sure the market row exists, fetching it on first reference.
    async fn ensure_market(
        &self,
        market_id: &str,
        fetched: &mut HashMap<String, GammaMarket>,
        report: &mut FetchReport,
    ) -> Result<()> {
        if market_id.is_empty() {
            return Err(AppError::InvalidInput("trade has no market id".to_string()));
        }
        if fetched.contains_key(market_id) || self.db.get_market(market_id).await?.is_some() {
            return Ok(());
        }

        let gm = self.client.get_market(market_id).await?;
        self.db.save_market(&gm.to_market()).await?;
        debug!(market_id, question = %gm.question, "Cached market");
        report.markets_fetched += 1;
        fetched.insert(market_id.to_string(), gm);
        Ok(())
    }

    /// Store a fresh price snapshot unless the latest one is recent enough.
    /// Returns whether a snapshot was written.
    async fn ensure_snapshot(&self, market_id: &str, fetched: &HashMap<String, GammaMarket>) -> Result<bool> {
        let now = Utc::now();
        if let Some(latest) = self.db.get_latest_market_snapshot(market_id).await? {
            if (now - latest.timestamp).num_seconds() < SNAPSHOT_MAX_AGE_SECS {
                return Ok(false);
            }
        }

        let (yes_price, no_price) = match fetched.get(market_id) {
            Some(gm) => gm.outcome_prices(),
            None => self.client.get_market(market_id).await?.outcome_prices(),
        };
        self.db
            .save_market_snapshot(&MarketSnapshot {
                id: None,
                market_id: market_id.to_string(),
                yes_price,
                no_price,
                timestamp: now,
            })
            .await?;
        Ok(true)
    }
}

/// Convert an API fill into a local trade owned by `address`.
///
/// The API does not say which outcome token was traded, so `side` is always
/// recorded as YES. Treat it as an approximation.
pub fn map_trade(address: &str, ct: &ClobTrade) -> Result<Trade> {
    let trade_type = ct.side.parse().map_err(AppError::InvalidInput)?;
    Ok(Trade {
        id: ct.id.clone(),
        trader_address: address.to_string(),
        market_id: ct.market_id.clone(),
        trade_type,
        side: Outcome::Yes,
        price: ct.price,
        size: ct.size,
        timestamp: DateTime::from_timestamp(ct.timestamp, 0).unwrap_or_default(),
    })
}
