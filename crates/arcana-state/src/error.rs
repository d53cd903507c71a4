//! Error types for arcana-state

use thiserror::Error;

/// Errors produced by history persistence backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No record with this id exists
    #[error("reading not found: {id}")]
    NotFound { id: String },

    /// The record exists but belongs to a different requester
    #[error("requester {requester} may not access reading {id}")]
    Unauthorized { id: String, requester: String },

    /// History is append-only; a record id can be saved once
    #[error("reading already recorded: {id}")]
    DuplicateRecord { id: String },

    /// A hex-encoded hash did not have the expected shape
    #[error("invalid {what}: {value}")]
    InvalidHash { what: &'static str, value: String },

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Backend-specific failure (connection, query, ...)
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
