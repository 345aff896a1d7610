//! Storage adapter error types.

use fitbridge_domain::error::FitBridgeError;

/// Errors specific to the `SQLite` storage adapter.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Query or connection failure.
    #[error("database error")]
    Sqlx(#[from] sqlx::Error),

    /// Migration failure during startup.
    #[error("migration error")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A blob column failed to (de)serialize.
    #[error("serialization error")]
    Serialize(#[from] serde_json::Error),
}

impl From<StorageError> for FitBridgeError {
    fn from(err: StorageError) -> Self {
        FitBridgeError::Storage(Box::new(err))
    }
}
