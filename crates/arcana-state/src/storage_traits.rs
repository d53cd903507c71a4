//! Storage trait definitions for Arcana
//!
//! `HistoryStore` is the record of truth for readings once the engine has
//! produced them. It is async and backend-agnostic; an in-memory fake is
//! provided in the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{DrawId, HistoryRecord, RequesterId};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Append-only reading history.
///
/// Guarantees:
/// - `save` stores a record exactly once; saving the same id again fails
///   with `StorageError::DuplicateRecord`.
/// - `get_by_id` only returns records owned by `owner`.
/// - `list_by_owner` returns the owner's records oldest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a new reading.
    async fn save(&self, record: HistoryRecord) -> StorageResult<()>;

    /// Fetch one reading. `NotFound` if absent, `Unauthorized` if owned by someone else.
    async fn get_by_id(&self, id: &DrawId, owner: &RequesterId) -> StorageResult<HistoryRecord>;

    /// All readings owned by `owner`.
    async fn list_by_owner(&self, owner: &RequesterId) -> StorageResult<Vec<HistoryRecord>>;
}
