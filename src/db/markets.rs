use std::collections::HashMap;

use super::models::{MarketRow, SnapshotRow};
use super::{to_millis, Database};
use crate::error::Result;
use crate::types::{Market, MarketSnapshot};

const SELECT_MARKET: &str =
    "SELECT id, question, description, category, ends_at, status FROM markets";

impl Database {
    pub async fn save_market(&self, m: &Market) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO markets (id, question, description, category, ends_at, status)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                question    = excluded.question,
                description = excluded.description,
                category    = excluded.category,
                ends_at     = excluded.ends_at,
                status      = excluded.status
            "#,
        )
        .bind(&m.id)
        .bind(&m.question)
        .bind(&m.description)
        .bind(&m.category)
        .bind(m.ends_at.map(to_millis))
        .bind(m.status.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_market(&self, id: &str) -> Result<Option<Market>> {
        let row = sqlx::query_as::<_, MarketRow>(&format!("{SELECT_MARKET} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Market::try_from).transpose()?)
    }

    /// Look up several markets at once. Unknown ids are simply absent from the map.
    pub async fn get_markets(&self, ids: &[String]) -> Result<HashMap<String, Market>> {
        let mut out = HashMap::new();
        for id in ids {
            if out.contains_key(id) {
                continue;
            }
            if let Some(m) = self.get_market(id).await? {
                out.insert(id.clone(), m);
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Snapshots (append-only)
    // -----------------------------------------------------------------------

    pub async fn save_market_snapshot(&self, s: &MarketSnapshot) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO market_snapshots (market_id, yes_price, no_price, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(&s.market_id)
        .bind(s.yes_price)
        .bind(s.no_price)
        .bind(to_millis(s.timestamp))
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_latest_market_snapshot(&self, market_id: &str) -> Result<Option<MarketSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, market_id, yes_price, no_price, timestamp
            FROM market_snapshots
            WHERE market_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(market_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(MarketSnapshot::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{db, ts};
    use crate::types::MarketStatus;

    fn market(id: &str, status: MarketStatus) -> Market {
        Market {
            id: id.to_string(),
            question: format!("Will {id} happen?"),
            description: None,
            category: Some("crypto".into()),
            ends_at: Some(ts(3600)),
            status,
        }
    }

    #[tokio::test]
    async fn upsert_market() {
        let db = db().await;
        db.save_market(&market("m1", MarketStatus::Active)).await.unwrap();
        let closed = market("m1", MarketStatus::Closed);
        db.save_market(&closed).await.unwrap();

        assert_eq!(db.get_market("m1").await.unwrap(), Some(closed));
        assert_eq!(db.get_market("m2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_markets_skips_unknown_ids() {
        let db = db().await;
        db.save_market(&market("m1", MarketStatus::Active)).await.unwrap();
        let map = db.get_markets(&["m1".into(), "m1".into(), "ghost".into()]).await.unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("m1"));
    }

    #[tokio::test]
    async fn latest_snapshot_is_max_timestamp() {
        let db = db().await;
        assert!(db.get_latest_market_snapshot("m1").await.unwrap().is_none());

        for (secs, yes) in [(0, 0.40), (200, 0.55), (100, 0.47)] {
            let snap = MarketSnapshot {
                id: None,
                market_id: "m1".into(),
                yes_price: yes,
                no_price: 1.0 - yes,
                timestamp: ts(secs),
            };
            db.save_market_snapshot(&snap).await.unwrap();
        }

        let latest = db.get_latest_market_snapshot("m1").await.unwrap().unwrap();
        assert_eq!(latest.timestamp, ts(200));
        assert_eq!(latest.yes_price, 0.55);
        assert!(latest.id.is_some());
    }
}
