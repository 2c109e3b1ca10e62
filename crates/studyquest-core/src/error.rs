//! Core error types for studyquest-core.
//!
//! Every error here is recoverable. Rejected commands leave engine,
//! registry and ledger state untouched.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyquest-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A session was started with a zero duration.
    #[error("Invalid duration: a study session must last at least one second")]
    InvalidDuration,

    /// A session is already running and the conflict policy rejects overrides.
    #[error("A study session is already active (ends at {ends_at})")]
    SessionAlreadyActive { ends_at: chrono::DateTime<chrono::Utc> },

    /// The wallet refused to pay for a catalog item.
    #[error("Insufficient funds: '{item}' costs {price} coins")]
    InsufficientFunds { item: String, price: u64 },

    /// The catalog has no item with this name.
    #[error("Unknown catalog item: {0}")]
    UnknownCatalogItem(String),

    /// Persisted timer state could not be decoded or violates its invariants.
    #[error("Corrupt persisted timer state: {0}")]
    CorruptPersistedState(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The study runtime task has shut down.
    #[error("Study runtime is no longer running")]
    RuntimeClosed,
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Two catalog entries share a name
    #[error("Duplicate catalog item: {0}")]
    DuplicateCatalogItem(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
