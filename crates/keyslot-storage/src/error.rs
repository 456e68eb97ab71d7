use thiserror::Error;

/// Failures of the slot record store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored settings blob is not valid JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row does not describe a valid slot record
    #[error("Invalid record {lock_id}/{slot_index}: {reason}")]
    InvalidRecord {
        lock_id: String,
        slot_index: i64,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn invalid_record(
        lock_id: impl Into<String>,
        slot_index: i64,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidRecord {
            lock_id: lock_id.into(),
            slot_index,
            reason: reason.to_string(),
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
