//! Error taxonomy for the suggestion core.
//!
//! Configuration errors are fatal at startup. Everything else is returned to
//! the immediate caller; nothing here retries or rolls back.

use redline_store::StoreError;
use thiserror::Error;

/// Result alias for runtime suggestion operations.
pub type SuggestResult<T> = std::result::Result<T, SuggestError>;

/// Errors raised while deriving or registering shadow schemas.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{entity} registered multiple times for edit suggestion tracking")]
    MultipleRegistrations { entity: String },

    #[error("Invalid bases: {0}")]
    InvalidBases(String),

    #[error("Entity name '{name}' collides with the entity '{entity}' in the same namespace")]
    NameConflict { name: String, entity: String },

    #[error("{0} is abstract; declare edit suggestions on it and finalize its concrete subtypes")]
    AbstractEntity(String),

    #[error("Attribute '{attribute}' of {entity} collides with a bookkeeping attribute; exclude it")]
    AttributeConflict { attribute: String, entity: String },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Invalid relation: {0}")]
    InvalidRelation(String),
}

/// Errors raised by runtime suggestion operations.
#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl SuggestError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this is an authorization failure (maps to a 403-style outcome).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}
