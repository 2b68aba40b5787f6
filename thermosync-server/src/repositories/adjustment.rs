use std::sync::Arc;

use async_trait::async_trait;
use thermosync_api::AdjustmentRecord;

use crate::configs::Storage;
use crate::errors::StoreError;
use crate::models::AdjustmentRow;
use crate::services::RestartStore;

#[derive(Clone)]
pub struct AdjustmentRepository {
    storage: Arc<Storage>,
}

impl AdjustmentRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl AdjustmentRepository {
    /// Inserts the record, replacing an earlier version with the same id.
    pub async fn upsert(&self, record: &AdjustmentRecord) -> Result<(), StoreError> {
        let row = AdjustmentRow::from(record);

        sqlx::query(
            r#"
            INSERT INTO adjustments (
                id, device_id, previous_target, new_target,
                ambient_at_adjustment, reason, triggered_at, notified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(id) DO UPDATE SET notified = excluded.notified
            "#,
        )
        .bind(&row.id)
        .bind(&row.device_id)
        .bind(row.previous_target)
        .bind(row.new_target)
        .bind(row.ambient_at_adjustment)
        .bind(&row.reason)
        .bind(row.triggered_at)
        .bind(row.notified)
        .execute(self.storage.get_pool())
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<AdjustmentRecord>, StoreError> {
        let row: Option<AdjustmentRow> = sqlx::query_as("SELECT * FROM adjustments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.storage.get_pool())
            .await?;

        row.map(AdjustmentRecord::try_from).transpose()
    }

    /// Most recent records first.
    pub async fn find_latest(&self, limit: i64) -> Result<Vec<AdjustmentRecord>, StoreError> {
        let rows: Vec<AdjustmentRow> = sqlx::query_as(
            r#"
            SELECT * FROM adjustments
            ORDER BY triggered_at DESC, rowid DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.storage.get_pool())
        .await?;

        rows.into_iter().map(AdjustmentRecord::try_from).collect()
    }
}

#[async_trait]
impl RestartStore for AdjustmentRepository {
    async fn load(&self) -> Result<Option<AdjustmentRecord>, StoreError> {
        Ok(self.find_latest(1).await?.into_iter().next())
    }

    async fn save(&self, record: &AdjustmentRecord) -> Result<(), StoreError> {
        self.upsert(record).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AdjustmentRecord>, StoreError> {
        self.find_latest(i64::try_from(limit).unwrap_or(i64::MAX)).await
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use time::macros::datetime;

    use crate::tests::*;

    use super::*;

    fn record_at(minutes: i64, new_target: f64) -> AdjustmentRecord {
        AdjustmentRecord::new(
            "device-1",
            new_target + 5.0,
            new_target,
            new_target + 1.0,
            "differential below threshold",
            datetime!(2026-01-05 10:00 UTC) + Duration::minutes(minutes),
        )
    }

    #[tokio::test]
    async fn test_load_empty_store() {
        let repo = AdjustmentRepository::new(setup_test_db().await);

        assert!(repo.load().await.unwrap().is_none());
        assert!(repo.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_returns_most_recent() {
        let repo = AdjustmentRepository::new(setup_test_db().await);

        repo.save(&record_at(0, 75.0)).await.unwrap();
        repo.save(&record_at(60, 70.0)).await.unwrap();
        repo.save(&record_at(30, 72.0)).await.unwrap();

        let latest = repo.load().await.unwrap().unwrap();
        assert_eq!(latest.new_target, 70.0);
        assert_eq!(latest.triggered_at, datetime!(2026-01-05 11:00 UTC));
    }

    #[tokio::test]
    async fn test_save_is_an_upsert() {
        let repo = AdjustmentRepository::new(setup_test_db().await);
        let record = record_at(0, 70.0);

        repo.save(&record).await.unwrap();
        repo.save(&record.with_notified(true)).await.unwrap();

        let all = repo.recent(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].notified);

        let found = repo.find_by_id(&record.id.to_string()).await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.previous_target, 75.0);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() {
        let repo = AdjustmentRepository::new(setup_test_db().await);

        for minutes in 0..5 {
            repo.save(&record_at(minutes * 10, 70.0 - minutes as f64))
                .await
                .unwrap();
        }

        let recent = repo.recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].new_target, 66.0);
        assert_eq!(recent[2].new_target, 68.0);
    }
}
