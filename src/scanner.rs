use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::polymarket::{ClobTrade, MarketClient};
use crate::types::Trader;

/// Markets sampled when the caller does not say otherwise.
pub const DEFAULT_MARKET_LIMIT: usize = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub markets_scanned: usize,
    pub markets_failed: usize,
    pub trades_seen: usize,
    pub traders_saved: usize,
    pub traders_failed: usize,
    /// Addresses dropped by the minimum-trade filter.
    pub traders_filtered: usize,
}

/// Per-address running totals while a scan is in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub volume: f64,
    pub trade_count: usize,
    pub last_seen: DateTime<Utc>,
}

/// Credit each trade's notional to both its maker and taker.
/// Empty addresses are skipped, so a one-sided trade credits only one address.
pub fn aggregate<'a, I>(trades: I, now: DateTime<Utc>, into: &mut HashMap<String, Activity>)
where
    I: IntoIterator<Item = &'a ClobTrade>,
{
    for t in trades {
        let notional = t.notional();
        for addr in [t.maker.trim(), t.taker.trim()] {
            if addr.is_empty() {
                continue;
            }
            let entry = into.entry(addr.to_string()).or_insert(Activity {
                volume: 0.0,
                trade_count: 0,
                last_seen: now,
            });
            entry.volume += notional;
            entry.trade_count += 1;
            entry.last_seen = now;
        }
    }
}

/// Discovers active addresses by sampling recent markets.
///
/// Only volume is aggregated. Win rate, P&L and ROI stay at zero for the
/// traders this writes; nothing here derives them from the sample.
#[derive(Debug, Clone)]
pub struct Scanner {
    client: MarketClient,
    db: Database,
    min_trades: usize,
}

impl Scanner {
    pub fn new(client: MarketClient, db: Database) -> Self {
        Self { client, db, min_trades: 0 }
    }

    /// Only save addresses seen in at least `n` trades.
    pub fn with_min_trades(mut self, n: usize) -> Self {
        self.min_trades = n;
        self
    }

    /// Best effort: failures per market and per save are logged and skipped.
    /// Only a failed market listing aborts the scan.
    pub async fn scan_recent_activity(&self, limit: usize) -> Result<ScanReport> {
        let markets = self.client.list_markets(limit).await?;
        info!(markets = markets.len(), limit, "Scanning recent markets");

        let mut report = ScanReport::default();
        let mut activity: HashMap<String, Activity> = HashMap::new();

        for market in &markets {
            let trades = match self.client.get_trades(&market.id).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(market_id = %market.id, "Failed to fetch market trades: {e}");
                    report.markets_failed += 1;
                    continue;
                }
            };
            report.markets_scanned += 1;
            report.trades_seen += trades.len();
            aggregate(&trades, Utc::now(), &mut activity);
        }

        for (address, act) in activity {
            if act.trade_count < self.min_trades {
                report.traders_filtered += 1;
                continue;
            }
            let mut trader = Trader::new(address, act.last_seen);
            trader.volume = act.volume;
            match self.db.save_trader(&trader).await {
                Ok(()) => report.traders_saved += 1,
                Err(e) => {
                    warn!(address = %trader.address, "Failed to save trader: {e}");
                    report.traders_failed += 1;
                }
            }
        }

        info!(
            scanned = report.markets_scanned,
            failed = report.markets_failed,
            trades = report.trades_seen,
            traders = report.traders_saved,
            "Scan complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::polymarket::test_support::{client, serve};

    fn trade(maker: &str, taker: &str, price: f64, size: f64) -> ClobTrade {
        ClobTrade {
            id: format!("{maker}-{taker}"),
            market_id: "m".into(),
            price,
            size,
            side: "BUY".into(),
            timestamp: 0,
            maker: maker.into(),
            taker: taker.into(),
        }
    }

    #[test]
    fn credits_both_sides() {
        let now = Utc::now();
        let mut acc = HashMap::new();
        aggregate(&[trade("A", "B", 0.5, 100.0)], now, &mut acc);

        assert_eq!(acc["A"].volume, 50.0);
        assert_eq!(acc["B"].volume, 50.0);
        assert_eq!(acc["A"].trade_count, 1);
        assert_eq!(acc["B"].last_seen, now);
    }

    #[test]
    fn empty_address_credits_only_the_other_side() {
        let mut acc = HashMap::new();
        aggregate(
            &[trade("A", "", 0.5, 100.0), trade("", "  ", 0.9, 10.0)],
            Utc::now(),
            &mut acc,
        );
        assert_eq!(acc.len(), 1);
        assert_eq!(acc["A"].volume, 50.0);
    }

    #[test]
    fn accumulates_across_trades() {
        let mut acc = HashMap::new();
        let trades = [trade("A", "B", 0.5, 100.0), trade("A", "C", 0.25, 40.0)];
        aggregate(&trades, Utc::now(), &mut acc);
        assert_eq!(acc["A"].volume, 60.0);
        assert_eq!(acc["A"].trade_count, 2);
        assert_eq!(acc["C"].volume, 10.0);
    }

    async fn mock() -> String {
        let router = Router::new()
            .route(
                "/markets",
                get(|| async { Json(json!([{"id": "m1"}, {"id": "broken"}, {"id": "m2"}])) }),
            )
            .route(
                "/trades",
                get(|Query(q): Query<Map<String, String>>| async move {
                    match q.get("market_id").map(String::as_str) {
                        Some("m1") => Ok(Json(json!([
                            {"id": "1", "market_id": "m1", "price": "0.5", "size": "100",
                             "side": "BUY", "timestamp": "1", "maker": "0xA", "taker": "0xB"}
                        ]))),
                        Some("m2") => Ok(Json(json!([
                            {"id": "2", "market_id": "m2", "price": "0.2", "size": "50",
                             "side": "SELL", "timestamp": "2", "maker": "0xA", "taker": ""}
                        ]))),
                        _ => Err(StatusCode::NOT_FOUND),
                    }
                }),
            );
        serve(router).await
    }

    #[tokio::test]
    async fn scan_survives_market_failure() {
        let base = mock().await;
        let db = Database::open_in_memory().await.unwrap();
        let report = Scanner::new(client(&base), db.clone())
            .scan_recent_activity(DEFAULT_MARKET_LIMIT)
            .await
            .unwrap();

        assert_eq!(report.markets_scanned, 2);
        assert_eq!(report.markets_failed, 1);
        assert_eq!(report.trades_seen, 2);
        assert_eq!(report.traders_saved, 2);

        let a = db.get_trader("0xA").await.unwrap().unwrap();
        assert_eq!(a.volume, 60.0);
        assert_eq!(a.profit_loss, 0.0);
        assert_eq!(db.get_trader("0xB").await.unwrap().unwrap().volume, 50.0);
    }

    #[tokio::test]
    async fn min_trades_filters_light_traders() {
        let base = mock().await;
        let db = Database::open_in_memory().await.unwrap();
        let report = Scanner::new(client(&base), db.clone())
            .with_min_trades(2)
            .scan_recent_activity(DEFAULT_MARKET_LIMIT)
            .await
            .unwrap();

        assert_eq!(report.traders_saved, 1);
        assert_eq!(report.traders_filtered, 1);
        assert!(db.get_trader("0xB").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_listing_aborts() {
        let router = Router::new().route("/markets", get(|| async { StatusCode::BAD_REQUEST }));
        let base = serve(router).await;
        let db = Database::open_in_memory().await.unwrap();
        assert!(Scanner::new(client(&base), db).scan_recent_activity(5).await.is_err());
    }
}
