use chrono::{DateTime, Utc};

use super::models::AnalysisRow;
use super::{to_millis, Database};
use crate::error::Result;
use crate::types::Analysis;

impl Database {
    /// Append a thesis to the trader's history and return its id.
    pub async fn save_analysis(&self, address: &str, thesis: &str, created_at: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO analyses (trader_id, thesis, created_at) VALUES (?, ?, ?)")
            .bind(address)
            .bind(thesis)
            .bind(to_millis(created_at))
            .execute(self.pool())
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// The most recent analysis, which is the canonical one.
    pub async fn get_latest_analysis(&self, address: &str) -> Result<Option<Analysis>> {
        let row = sqlx::query_as::<_, AnalysisRow>(
            r#"
            SELECT id, trader_id, thesis, created_at
            FROM analyses
            WHERE trader_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(address)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Analysis::from))
    }

    pub async fn list_analyses(&self, address: &str) -> Result<Vec<Analysis>> {
        let rows = sqlx::query_as::<_, AnalysisRow>(
            r#"
            SELECT id, trader_id, thesis, created_at
            FROM analyses
            WHERE trader_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(address)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Analysis::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::{db, ts};

    #[tokio::test]
    async fn history_and_latest() {
        let db = db().await;
        assert!(db.get_latest_analysis("0xaaa").await.unwrap().is_none());

        let first = db.save_analysis("0xaaa", "first take", ts(0)).await.unwrap();
        let second = db.save_analysis("0xaaa", "second take", ts(10)).await.unwrap();
        db.save_analysis("0xbbb", "someone else", ts(20)).await.unwrap();
        assert_ne!(first, second);

        let latest = db.get_latest_analysis("0xaaa").await.unwrap().unwrap();
        assert_eq!(latest.thesis, "second take");
        assert_eq!(latest.id, second);

        let all = db.list_analyses("0xaaa").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].thesis, "first take");
    }
}
