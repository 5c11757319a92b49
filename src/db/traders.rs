use chrono::{DateTime, Utc};

use super::models::TraderRow;
use super::{to_millis, Database};
use crate::error::Result;
use crate::types::{ListTradersOptions, Trader};

const SELECT_TRADER: &str =
    "SELECT address, username, win_rate, profit_loss, roi, volume, last_scanned FROM traders";

impl Database {
    /// Insert or fully replace a trader keyed by address.
    pub async fn save_trader(&self, t: &Trader) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO traders (address, username, win_rate, profit_loss, roi, volume, last_scanned)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(address) DO UPDATE SET
                username     = excluded.username,
                win_rate     = excluded.win_rate,
                profit_loss  = excluded.profit_loss,
                roi          = excluded.roi,
                volume       = excluded.volume,
                last_scanned = excluded.last_scanned
            "#,
        )
        .bind(&t.address)
        .bind(&t.username)
        .bind(t.win_rate)
        .bind(t.profit_loss)
        .bind(t.roi)
        .bind(t.volume)
        .bind(to_millis(t.last_scanned))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Record that an address was seen. A new row gets `volume`; an existing row keeps
    /// its statistics and only has `last_scanned` refreshed.
    pub async fn touch_trader(&self, address: &str, volume: f64, seen_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO traders (address, volume, last_scanned)
            VALUES (?, ?, ?)
            ON CONFLICT(address) DO UPDATE SET last_scanned = excluded.last_scanned
            "#,
        )
        .bind(address)
        .bind(volume)
        .bind(to_millis(seen_at))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_trader(&self, address: &str) -> Result<Option<Trader>> {
        let row = sqlx::query_as::<_, TraderRow>(&format!("{SELECT_TRADER} WHERE address = ?"))
            .bind(address)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Trader::from))
    }

    /// All traders, best P&L first.
    pub async fn list_traders(&self) -> Result<Vec<Trader>> {
        self.list_traders_with_options(&ListTradersOptions::default()).await
    }

    /// Sorted, paginated listing. Address breaks ties so pages never overlap.
    pub async fn list_traders_with_options(&self, opts: &ListTradersOptions) -> Result<Vec<Trader>> {
        let sql = format!(
            "{SELECT_TRADER} ORDER BY {} {}, address ASC LIMIT ? OFFSET ?",
            opts.sort_by.column(),
            opts.order.sql(),
        );
        // SQLite treats a negative LIMIT as unbounded.
        let rows = sqlx::query_as::<_, TraderRow>(&sql)
            .bind(opts.limit.unwrap_or(-1))
            .bind(opts.offset.max(0))
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Trader::from).collect())
    }

    pub async fn count_traders(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM traders")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{db, trader, ts};
    use crate::types::{SortField, SortOrder};

    #[tokio::test]
    async fn save_then_get() {
        let db = db().await;
        let mut t = trader("0xaaa", 12.5);
        t.username = Some("alice".into());
        db.save_trader(&t).await.unwrap();

        assert_eq!(db.get_trader("0xaaa").await.unwrap(), Some(t));
        assert_eq!(db.get_trader("0xmissing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn resave_keeps_one_row_with_latest_values() {
        let db = db().await;
        db.save_trader(&trader("0xaaa", 1.0)).await.unwrap();

        let mut updated = trader("0xaaa", -40.0);
        updated.volume = 9000.0;
        updated.last_scanned = ts(60);
        db.save_trader(&updated).await.unwrap();

        assert_eq!(db.count_traders().await.unwrap(), 1);
        assert_eq!(db.get_trader("0xaaa").await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn touch_creates_then_preserves_stats() {
        let db = db().await;
        db.touch_trader("0xnew", 50.0, ts(0)).await.unwrap();
        let created = db.get_trader("0xnew").await.unwrap().unwrap();
        assert_eq!(created.volume, 50.0);
        assert_eq!(created.profit_loss, 0.0);

        db.save_trader(&trader("0xold", 300.0)).await.unwrap();
        db.touch_trader("0xold", 1.0, ts(120)).await.unwrap();
        let touched = db.get_trader("0xold").await.unwrap().unwrap();
        assert_eq!(touched.profit_loss, 300.0);
        assert_eq!(touched.volume, 1000.0);
        assert_eq!(touched.last_scanned, ts(120));
    }

    #[tokio::test]
    async fn list_defaults_to_pnl_desc() {
        let db = db().await;
        for (addr, pnl) in [("0x1", 10.0), ("0x2", 30.0), ("0x3", -5.0)] {
            db.save_trader(&trader(addr, pnl)).await.unwrap();
        }
        let addrs: Vec<String> = db
            .list_traders()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.address)
            .collect();
        assert_eq!(addrs, ["0x2", "0x1", "0x3"]);
    }

    #[tokio::test]
    async fn pages_cover_every_trader_once() {
        let db = db().await;
        // Duplicate P&L values exercise the tie-breaker.
        for i in 0..45 {
            db.save_trader(&trader(&format!("0x{i:03}"), (i % 7) as f64)).await.unwrap();
        }

        let mut seen = Vec::new();
        for page in 0..3 {
            let opts = ListTradersOptions {
                sort_by: SortField::ProfitLoss,
                order: SortOrder::Desc,
                limit: Some(20),
                offset: page * 20,
            };
            seen.extend(db.list_traders_with_options(&opts).await.unwrap());
        }

        assert_eq!(seen.len(), 45);
        let mut addrs: Vec<&str> = seen.iter().map(|t| t.address.as_str()).collect();
        assert!(seen.windows(2).all(|w| w[0].profit_loss >= w[1].profit_loss));
        addrs.sort();
        addrs.dedup();
        assert_eq!(addrs.len(), 45);
    }

    #[tokio::test]
    async fn sorts_by_other_fields_ascending() {
        let db = db().await;
        let mut a = trader("0xa", 0.0);
        a.volume = 300.0;
        let mut b = trader("0xb", 0.0);
        b.volume = 100.0;
        db.save_trader(&a).await.unwrap();
        db.save_trader(&b).await.unwrap();

        let opts = ListTradersOptions {
            sort_by: SortField::Volume,
            order: SortOrder::Asc,
            limit: None,
            offset: 0,
        };
        let list = db.list_traders_with_options(&opts).await.unwrap();
        assert_eq!(list[0].address, "0xb");
        assert_eq!(list[1].address, "0xa");
    }
}
