use thermosync_api::AdjustmentRecord;
use time::OffsetDateTime;
use uuid::Uuid;

use super::Table;
use crate::errors::StoreError;

/// Row shape of the `adjustments` table. The identifier is kept as text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdjustmentRow {
    pub id: String,
    pub device_id: String,
    pub previous_target: f64,
    pub new_target: f64,
    pub ambient_at_adjustment: f64,
    pub reason: String,
    pub triggered_at: OffsetDateTime,
    pub notified: bool,
}

impl From<&AdjustmentRecord> for AdjustmentRow {
    fn from(record: &AdjustmentRecord) -> Self {
        Self {
            id: record.id.to_string(),
            device_id: record.device_id.clone(),
            previous_target: record.previous_target,
            new_target: record.new_target,
            ambient_at_adjustment: record.ambient_at_adjustment,
            reason: record.reason.clone(),
            triggered_at: record.triggered_at,
            notified: record.notified,
        }
    }
}

impl TryFrom<AdjustmentRow> for AdjustmentRecord {
    type Error = StoreError;

    fn try_from(row: AdjustmentRow) -> Result<Self, Self::Error> {
        Ok(AdjustmentRecord {
            id: Uuid::parse_str(&row.id)?,
            device_id: row.device_id,
            previous_target: row.previous_target,
            new_target: row.new_target,
            ambient_at_adjustment: row.ambient_at_adjustment,
            reason: row.reason,
            triggered_at: row.triggered_at,
            notified: row.notified,
        })
    }
}

#[derive(Clone)]
pub struct AdjustmentTable;

impl Table for AdjustmentTable {
    fn name(&self) -> &'static str {
        "adjustments"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS adjustments (
                id VARCHAR(36) PRIMARY KEY,
                device_id VARCHAR(255) NOT NULL,
                previous_target REAL NOT NULL,
                new_target REAL NOT NULL,
                ambient_at_adjustment REAL NOT NULL,
                reason TEXT NOT NULL DEFAULT '',
                triggered_at TIMESTAMP NOT NULL,
                notified BOOLEAN NOT NULL DEFAULT FALSE
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS adjustments;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }
}
