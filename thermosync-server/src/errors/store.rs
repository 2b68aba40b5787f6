#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt adjustment identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
