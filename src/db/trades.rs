use super::models::TradeRow;
use super::{to_millis, Database};
use crate::error::Result;
use crate::types::Trade;

impl Database {
    /// Insert or fully replace a trade keyed by its upstream id.
    pub async fn save_trade(&self, t: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (id, trader_id, market_id, type, side, price, size, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                trader_id = excluded.trader_id,
                market_id = excluded.market_id,
                type      = excluded.type,
                side      = excluded.side,
                price     = excluded.price,
                size      = excluded.size,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&t.id)
        .bind(&t.trader_address)
        .bind(&t.market_id)
        .bind(t.trade_type.to_string())
        .bind(t.side.to_string())
        .bind(t.price)
        .bind(t.size)
        .bind(to_millis(t.timestamp))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// A trader's trades, newest first.
    pub async fn get_trades_by_trader(&self, address: &str) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT id, trader_id, market_id, type, side, price, size, timestamp
            FROM trades
            WHERE trader_id = ?
            ORDER BY timestamp DESC, id ASC
            "#,
        )
        .bind(address)
        .fetch_all(self.pool())
        .await?;

        let trades = rows
            .into_iter()
            .map(Trade::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(trades)
    }

    pub async fn count_trades_by_trader(&self, address: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trades WHERE trader_id = ?")
            .bind(address)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::{db, trade, ts};
    use crate::types::{Outcome, TradeType};

    #[tokio::test]
    async fn reingest_replaces_all_fields() {
        let db = db().await;
        db.save_trade(&trade("t1", "0xaaa", "m1", 0)).await.unwrap();

        let mut changed = trade("t1", "0xaaa", "m2", 30);
        changed.trade_type = TradeType::Sell;
        changed.side = Outcome::No;
        changed.price = 0.91;
        changed.size = 7.0;
        db.save_trade(&changed).await.unwrap();

        let trades = db.get_trades_by_trader("0xaaa").await.unwrap();
        assert_eq!(trades, vec![changed]);
        assert_eq!(db.count_trades_by_trader("0xaaa").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn newest_first_and_scoped_to_trader() {
        let db = db().await;
        db.save_trade(&trade("old", "0xaaa", "m1", 0)).await.unwrap();
        db.save_trade(&trade("new", "0xaaa", "m1", 100)).await.unwrap();
        db.save_trade(&trade("other", "0xbbb", "m1", 50)).await.unwrap();

        let ids: Vec<String> = db
            .get_trades_by_trader("0xaaa")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, ["new", "old"]);
        assert_eq!(db.get_trades_by_trader("0xaaa").await.unwrap()[0].timestamp, ts(100));
        assert!(db.get_trades_by_trader("0xnobody").await.unwrap().is_empty());
    }
}
