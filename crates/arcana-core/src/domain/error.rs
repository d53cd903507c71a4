//! Domain-level error taxonomy for Arcana.

use arcana_state::StorageError;

use crate::entropy::EntropyError;
use crate::spread::SpreadError;

/// Malformed reading input. Raised before any seed is requested.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("question must be between {min} and {max} characters, got {chars}")]
    QuestionLength { chars: usize, min: usize, max: usize },

    #[error("number of cards must be between {min} and {max}, got {requested}")]
    CardCount {
        requested: usize,
        min: usize,
        max: usize,
    },
}

/// Arcana domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ArcanaError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("entropy unavailable: {0}")]
    EntropyUnavailable(#[from] EntropyError),

    #[error("invalid spread: {0}")]
    InvalidSpread(#[from] SpreadError),

    #[error("reading not found: {id}")]
    NotFound { id: String },

    #[error("requester {requester} may not access reading {id}")]
    Unauthorized { id: String, requester: String },

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for ArcanaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => ArcanaError::NotFound { id },
            StorageError::Unauthorized { id, requester } => {
                ArcanaError::Unauthorized { id, requester }
            }
            other => ArcanaError::StorageError(other.to_string()),
        }
    }
}

/// Result type for Arcana domain operations.
pub type Result<T> = std::result::Result<T, ArcanaError>;
