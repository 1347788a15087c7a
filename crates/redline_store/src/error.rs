//! Error types for the storage layer.

use thiserror::Error;

/// Storage operation result type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record or relation owner not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same identity already exists
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// A lock guarding the engine was poisoned by a panicking writer
    #[error("Store lock poisoned: {0}")]
    Poisoned(String),

    /// A stored value could not be read back as a [`crate::Value`]
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error (database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a duplicate record error.
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a poisoned lock error.
    pub fn poisoned(msg: impl Into<String>) -> Self {
        Self::Poisoned(msg.into())
    }
}
