//! Narrow read interface to the anchoring blockchain.

use async_trait::async_trait;

use arcana_state::BlockReference;

/// Errors a chain client may report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Transport or node failure; worth retrying.
    #[error("chain unavailable: {0}")]
    Unavailable(String),

    /// The slot exists or will exist but has not reached finality yet.
    #[error("{reference} is not finalized yet")]
    NotFinalized { reference: BlockReference },

    /// The slot was finalized empty (skipped) or is otherwise unusable.
    #[error("{reference} has no usable value: {reason}")]
    Unusable {
        reference: BlockReference,
        reason: String,
    },
}

/// Read-only blockchain access.
///
/// Implementations wrap a real node/RPC endpoint; consensus and transport
/// are their concern. The engine only needs the two reads below.
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    /// Most recent finalized slot.
    async fn latest_finalized_reference(&self) -> Result<BlockReference, ChainError>;

    /// Finalized value (block hash bytes) for `reference`.
    ///
    /// Returns `ChainError::NotFinalized` while the slot is still pending.
    async fn block_value(&self, reference: &BlockReference) -> Result<Vec<u8>, ChainError>;
}
