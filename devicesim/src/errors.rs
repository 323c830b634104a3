use std::time::Duration;
use thiserror::Error;

/// Failures of the key-value backend and the record layers built on it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed record at {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Conflicting writes on device {device_id} after {attempts} attempts")]
    Conflict { device_id: String, attempts: u32 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Command on device {device_id} not reliably recorded: {source}")]
    Persistence {
        device_id: String,
        #[source]
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
