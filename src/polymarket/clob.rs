use serde::Deserialize;

use super::{de_f64, de_unix_secs, MarketClient};
use crate::error::Result;

/// A fill as returned by the CLOB trades endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ClobTrade {
    pub id: String,
    #[serde(default, alias = "market")]
    pub market_id: String,
    #[serde(default, deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub size: f64,
    /// `BUY` or `SELL` from the maker's perspective.
    #[serde(default)]
    pub side: String,
    #[serde(alias = "match_time", deserialize_with = "de_unix_secs")]
    pub timestamp: i64,
    #[serde(default, alias = "maker_address")]
    pub maker: String,
    #[serde(default, alias = "taker_address")]
    pub taker: String,
}

impl ClobTrade {
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}

/// The trades endpoint answers with a bare array or a `{ "data": [...] }` page.
#[derive(Deserialize)]
#[serde(untagged)]
enum TradesResponse {
    List(Vec<ClobTrade>),
    Page { data: Vec<ClobTrade> },
}

impl From<TradesResponse> for Vec<ClobTrade> {
    fn from(r: TradesResponse) -> Self {
        match r {
            TradesResponse::List(v) | TradesResponse::Page { data: v } => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    #[serde(deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(deserialize_with = "de_f64")]
    pub size: f64,
}

/// Order book snapshot for one outcome token.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBook {
    #[serde(default, alias = "market")]
    pub market_id: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Highest bid with non-zero size. Level order on the wire is not relied on.
    pub fn best_bid(&self) -> Option<f64> {
        self.bids
            .iter()
            .filter(|l| l.size > 0.0)
            .map(|l| l.price)
            .fold(None, |best, p| Some(best.map_or(p, |b: f64| b.max(p))))
    }

    /// Lowest ask with non-zero size.
    pub fn best_ask(&self) -> Option<f64> {
        self.asks
            .iter()
            .filter(|l| l.size > 0.0)
            .map(|l| l.price)
            .fold(None, |best, p| Some(best.map_or(p, |b: f64| b.min(p))))
    }

    #[allow(dead_code)]
    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((a + b) / 2.0),
            _ => None,
        }
    }
}

impl MarketClient {
    /// `GET {clob}/trades?market_id=`
    pub async fn get_trades(&self, market_id: &str) -> Result<Vec<ClobTrade>> {
        let url = format!("{}/trades", self.clob_url());
        let resp: TradesResponse = self.get_json(&url, &[("market_id", market_id.to_string())]).await?;
        Ok(resp.into())
    }

    /// `GET {clob}/trades?maker_address=`
    pub async fn get_account_trades(&self, address: &str) -> Result<Vec<ClobTrade>> {
        let url = format!("{}/trades", self.clob_url());
        let resp: TradesResponse = self.get_json(&url, &[("maker_address", address.to_string())]).await?;
        Ok(resp.into())
    }

    /// `GET {clob}/book?token_id=`
    #[allow(dead_code)]
    pub async fn get_orderbook(&self, token_id: &str) -> Result<OrderBook> {
        let url = format!("{}/book", self.clob_url());
        self.get_json(&url, &[("token_id", token_id.to_string())]).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::polymarket::test_support::{client, serve};

    fn level(price: f64, size: f64) -> BookLevel {
        BookLevel { price, size }
    }

    #[test]
    fn decodes_string_encoded_trade() {
        let t: ClobTrade = serde_json::from_value(json!({
            "id": "t-1",
            "market_id": "m-1",
            "price": "0.5",
            "size": "100",
            "side": "BUY",
            "timestamp": "1700000000",
            "maker": "0xmaker",
            "taker": "0xtaker"
        }))
        .unwrap();
        assert_eq!(t.notional(), 50.0);
        assert_eq!(t.timestamp, 1_700_000_000);
        assert_eq!(t.maker, "0xmaker");
    }

    #[test]
    fn accepts_paged_trades() {
        let paged: TradesResponse = serde_json::from_value(json!({
            "data": [{"id": "a", "market": "m", "price": 0.1, "size": 1, "side": "SELL", "match_time": 5}]
        }))
        .unwrap();
        let trades: Vec<ClobTrade> = paged.into();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].market_id, "m");
    }

    #[test]
    fn best_prices_ignore_order_and_empty_levels() {
        let book = OrderBook {
            market_id: "m".into(),
            asset_id: "a".into(),
            bids: vec![level(0.40, 10.0), level(0.45, 5.0), level(0.50, 0.0)],
            asks: vec![level(0.60, 3.0), level(0.55, 8.0)],
        };
        assert_eq!(book.best_bid(), Some(0.45));
        assert_eq!(book.best_ask(), Some(0.55));
        assert!((book.mid().unwrap() - 0.50).abs() < 1e-9);

        let empty = OrderBook { bids: vec![], ..book };
        assert_eq!(empty.best_bid(), None);
        assert_eq!(empty.mid(), None);
    }

    #[tokio::test]
    async fn query_parameters_reach_server() {
        let router = Router::new()
            .route(
                "/trades",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let who = q
                        .get("market_id")
                        .or_else(|| q.get("maker_address"))
                        .cloned()
                        .unwrap_or_default();
                    Json(json!([{
                        "id": format!("trade-for-{who}"),
                        "market_id": "m1",
                        "price": "0.25",
                        "size": "4",
                        "side": "BUY",
                        "timestamp": "1700000000",
                        "maker": who,
                        "taker": ""
                    }]))
                }),
            )
            .route(
                "/book",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "market": "m1",
                        "asset_id": q.get("token_id").cloned().unwrap_or_default(),
                        "bids": [{"price": "0.48", "size": "10"}],
                        "asks": [{"price": "0.52", "size": "10"}]
                    }))
                }),
            );
        let base = serve(router).await;
        let c = client(&base);

        assert_eq!(c.get_trades("m1").await.unwrap()[0].id, "trade-for-m1");
        assert_eq!(c.get_account_trades("0xabc").await.unwrap()[0].maker, "0xabc");

        let book = c.get_orderbook("tok-9").await.unwrap();
        assert_eq!(book.asset_id, "tok-9");
        assert_eq!(book.best_ask(), Some(0.52));
    }
}
