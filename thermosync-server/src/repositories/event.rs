use std::sync::Arc;

use serde_json::Value;
use sqlx::Error;
use time::OffsetDateTime;

use crate::configs::Storage;
use crate::models::Event;

#[derive(Clone)]
pub struct EventRepository {
    storage: Arc<Storage>,
}

impl EventRepository {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl EventRepository {
    pub async fn create(
        &self,
        event_type: &str,
        payload: &Value,
        time: OffsetDateTime,
    ) -> Result<i64, Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO events (event_type, payload, time)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(event_type)
        .bind(payload)
        .bind(time)
        .execute(self.storage.get_pool())
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, Error> {
        let event: Option<Event> = sqlx::query_as("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(self.storage.get_pool())
            .await?;

        Ok(event)
    }

    pub async fn find_by_type(&self, event_type: &str, limit: i64) -> Result<Vec<Event>, Error> {
        let events: Vec<Event> = sqlx::query_as(
            r#"
            SELECT * FROM events
            WHERE event_type = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(event_type)
        .bind(limit)
        .fetch_all(self.storage.get_pool())
        .await?;

        Ok(events)
    }
}
