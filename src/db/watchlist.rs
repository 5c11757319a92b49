use chrono::{DateTime, Utc};

use super::models::WatchlistRow;
use super::{to_millis, Database};
use crate::error::Result;
use crate::types::WatchlistItem;

impl Database {
    /// Add or re-add an address. Re-adding overwrites the notes and keeps the
    /// original `created_at`.
    pub async fn add_to_watchlist(&self, address: &str, notes: &str, added_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watchlist (trader_id, notes, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(trader_id) DO UPDATE SET notes = excluded.notes
            "#,
        )
        .bind(address)
        .bind(notes)
        .bind(to_millis(added_at))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_watchlist_item(&self, address: &str) -> Result<Option<WatchlistItem>> {
        let row = sqlx::query_as::<_, WatchlistRow>(
            "SELECT trader_id, notes, created_at FROM watchlist WHERE trader_id = ?",
        )
        .bind(address)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(WatchlistItem::from))
    }

    pub async fn is_watched(&self, address: &str) -> Result<bool> {
        Ok(self.get_watchlist_item(address).await?.is_some())
    }

    /// Returns false when the address is not on the watchlist.
    pub async fn update_watchlist_notes(&self, address: &str, notes: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE watchlist SET notes = ? WHERE trader_id = ?")
            .bind(notes)
            .bind(address)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_from_watchlist(&self, address: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE trader_id = ?")
            .bind(address)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest additions first.
    pub async fn list_watchlist(&self) -> Result<Vec<WatchlistItem>> {
        let rows = sqlx::query_as::<_, WatchlistRow>(
            "SELECT trader_id, notes, created_at FROM watchlist ORDER BY created_at DESC, trader_id ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(WatchlistItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::{db, ts};

    #[tokio::test]
    async fn readd_overwrites_notes_keeps_created_at() {
        let db = db().await;
        db.add_to_watchlist("0xaaa", "first", ts(0)).await.unwrap();
        db.add_to_watchlist("0xaaa", "second", ts(500)).await.unwrap();

        let items = db.list_watchlist().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].notes, "second");
        assert_eq!(items[0].created_at, ts(0));
    }

    #[tokio::test]
    async fn remove_then_lookup_is_none() {
        let db = db().await;
        db.add_to_watchlist("0xaaa", "", ts(0)).await.unwrap();
        db.add_to_watchlist("0xbbb", "", ts(1)).await.unwrap();

        assert!(db.remove_from_watchlist("0xaaa").await.unwrap());
        assert!(db.get_watchlist_item("0xaaa").await.unwrap().is_none());
        assert!(!db.is_watched("0xaaa").await.unwrap());

        let listed: Vec<String> = db
            .list_watchlist()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.trader_address)
            .collect();
        assert_eq!(listed, ["0xbbb"]);
    }

    #[tokio::test]
    async fn notes_update_and_ordering() {
        let db = db().await;
        db.add_to_watchlist("0xold", "", ts(0)).await.unwrap();
        db.add_to_watchlist("0xnew", "", ts(100)).await.unwrap();

        assert!(db.update_watchlist_notes("0xold", "fades longshots").await.unwrap());
        assert!(!db.update_watchlist_notes("0xnobody", "x").await.unwrap());

        let items = db.list_watchlist().await.unwrap();
        assert_eq!(items[0].trader_address, "0xnew");
        assert_eq!(items[1].notes, "fades longshots");
    }
}
