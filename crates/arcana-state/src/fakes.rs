//! In-memory fakes for storage traits
//!
//! `MemoryHistoryStore` satisfies the `HistoryStore` contract without any
//! external dependencies. Used by tests and by the CLI's offline mode.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;
use crate::schema::{DrawId, HistoryRecord, RequesterId};
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, HistoryRecord>,
    /// Insertion order, so listings come back oldest first
    order: Vec<String>,
}

/// In-memory history store backed by a `HashMap<DrawId, HistoryRecord>`.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    inner: Mutex<Inner>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, record: HistoryRecord) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let id = record.id().0.clone();
        if inner.records.contains_key(&id) {
            return Err(StorageError::DuplicateRecord { id });
        }
        debug!(id = %id, owner = %record.owner(), "reading recorded");
        inner.order.push(id.clone());
        inner.records.insert(id, record);
        Ok(())
    }

    async fn get_by_id(&self, id: &DrawId, owner: &RequesterId) -> StorageResult<HistoryRecord> {
        let inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .get(&id.0)
            .ok_or_else(|| StorageError::NotFound { id: id.0.clone() })?;
        if record.owner() != owner {
            return Err(StorageError::Unauthorized {
                id: id.0.clone(),
                requester: owner.0.clone(),
            });
        }
        Ok(record.clone())
    }

    async fn list_by_owner(&self, owner: &RequesterId) -> StorageResult<Vec<HistoryRecord>> {
        let inner = self.inner.lock().unwrap();
        let records = inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|r| r.owner() == owner)
            .cloned()
            .collect();
        Ok(records)
    }
}
