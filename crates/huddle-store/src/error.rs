//! Error types for the store.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A write was attempted inside a read-only transaction.
    #[error("write attempted in a read-only transaction")]
    ReadOnly,

    /// The connection mutex was poisoned by a panicking writer.
    #[error("store connection poisoned")]
    Poisoned,

    /// A record cannot be persisted in its current shape.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
