//! Error types for Foothold operations.
//!
//! Every enum is `Clone + PartialEq` so that single-flight awaiters can
//! share a failure and tests can assert on exact variants.

use thiserror::Error;

/// Identifier validation errors.
///
/// Raised synchronously, before any I/O is performed, and always surfaced
/// to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Handle is empty")]
    EmptyHandle,

    #[error("Malformed handle: {handle:?}")]
    BadHandle { handle: String },

    #[error("Malformed group id: {group_id:?}")]
    BadGroupId { group_id: String },

    #[error("Handle {requested} does not own the active ledger (active: {active})")]
    HandleMismatch { active: String, requested: String },

    #[error("No active user")]
    NoActiveUser,
}

/// Service fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetch failed: {reason}")]
    Network { reason: String },

    #[error("No such user: {handle}")]
    NotFound { handle: String },

    #[error("Malformed service payload: {reason}")]
    Malformed { reason: String },
}

/// Persistent store errors.
///
/// Quota violations are absorbed at the cache-adapter boundary and never
/// reach callers of the session API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store quota exceeded writing {key}")]
    QuotaExceeded { key: String },

    #[error("Store backend failure: {reason}")]
    Backend { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Foothold errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FootholdError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Foothold operations.
pub type FootholdResult<T> = Result<T, FootholdError>;

// =============================================================================
// TESTS
// =============================================================================
