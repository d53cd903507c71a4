//! Arcana-State: reading records and history persistence
//!
//! This crate holds the persisted shape of a reading and the storage seam
//! the draw engine hands finished readings to.
//!
//! ## Key Components
//!
//! - `Draw` / `SeedProof`: a proof-carrying card draw
//! - `InterpretationResult`: narrative attached to a draw
//! - `HistoryStore`: append-only, owner-scoped reading history
//! - `fakes::MemoryHistoryStore`: in-memory reference backend

mod error;
pub mod fakes;
pub mod schema;
pub mod storage_traits;

pub use error::StorageError;
pub use schema::{
    BlockReference, Bytes32, Draw, DrawId, DrawnCard, HistoryRecord, InterpretationResult,
    Orientation, ProviderMetadata, QuestionSentiment, RequesterId, SeedProof, Sentiment, Tier,
};
pub use storage_traits::{HistoryStore, StorageResult};
