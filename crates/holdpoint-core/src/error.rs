//! Core error types for holdpoint-core.
//!
//! Every failure the engine can see falls into one of four buckets: an invalid
//! reference from the caller, a host resource that could not be acquired, a
//! persistence failure, or an outbound sink failure. Only the first is ever
//! returned from a user command; the rest are logged and the session carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for holdpoint-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid references and rejected values
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Wake-lock or audio output problems
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Outbound session sink failures
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors. These are the only errors a user command returns, and
/// they are always raised before any state is touched.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// No built-in or user-authored routine has this name
    #[error("Unknown routine: {0}")]
    UnknownRoutine(String),

    /// Out of bounds
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// A command needs a session but none is active
    #[error("No active session")]
    NoActiveSession,

    /// A session is already in progress
    #[error("A session for '{0}' is already active")]
    SessionActive(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Host resource errors (wake-lock, audio output).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The host has no such capability
    #[error("{0} is not supported on this host")]
    Unsupported(&'static str),

    /// The host took the resource back
    #[error("{0} was revoked by the host")]
    Revoked(&'static str),

    /// Acquisition failed for another reason
    #[error("Resource unavailable: {0}")]
    Unavailable(String),
}

/// Outbound sink errors.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Sink is not configured (no URL)
    #[error("Sink '{0}' is not configured")]
    NotConfigured(String),

    /// Remote answered with a non-success status
    #[error("Sink '{sink}' returned HTTP {status}: {body}")]
    Http {
        sink: String,
        status: u16,
        body: String,
    },

    /// Request never completed
    #[error("Sink '{sink}' transport failure: {message}")]
    Transport { sink: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked
                {
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
        CoreError::Database(DatabaseError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
