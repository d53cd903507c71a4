//! Two-phase commit/reveal seed issuance.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use arcana_state::{BlockReference, Bytes32, SeedProof};

use super::chain::{BlockchainClient, ChainError};
use super::commitment::{commitment_for, derive_seed, verify_commitment};
use crate::backoff::BackoffPolicy;
use crate::metrics::METRICS;
use crate::obs;

/// Errors from seed issuance. Always fatal for the reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntropyError {
    #[error("chain unreachable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    #[error("{reference} did not finalize within {waited_ms}ms")]
    FinalityTimeout {
        reference: BlockReference,
        waited_ms: u64,
    },

    #[error("anchor rejected: {0}")]
    AnchorRejected(String),
}

/// Configuration for chain access during seed issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Attempts per chain read before giving up (>= 1).
    pub max_attempts: u32,
    /// Backoff between failed chain reads.
    pub backoff: BackoffPolicy,
    /// How far past the latest finalized slot the reveal is anchored.
    pub lookahead_slots: u64,
    /// Poll interval while waiting for the anchor slot to finalize (milliseconds).
    pub finality_poll_ms: u64,
    /// Upper bound on the wait for finality (milliseconds).
    pub finality_timeout_ms: u64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: BackoffPolicy::default(),
            lookahead_slots: 2,
            finality_poll_ms: 400,
            finality_timeout_ms: 30_000,
        }
    }
}

/// The publishable half of a pending seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCommitment {
    pub commitment_hash: Bytes32,
    pub blockchain_reference: BlockReference,
    pub issued_at: DateTime<Utc>,
}

/// A commitment whose reveal is still pending.
///
/// Holds the secret pre-image. Not `Clone`: resolving consumes it, so each
/// commitment backs exactly one draw. Dropping it abandons the commitment.
pub struct PendingSeed {
    commitment: SeedCommitment,
    preimage: Bytes32,
}

impl PendingSeed {
    pub fn commitment(&self) -> &SeedCommitment {
        &self.commitment
    }

    pub fn commitment_hash(&self) -> &Bytes32 {
        &self.commitment.commitment_hash
    }

    pub fn blockchain_reference(&self) -> &BlockReference {
        &self.commitment.blockchain_reference
    }
}

impl fmt::Debug for PendingSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSeed")
            .field("commitment", &self.commitment)
            .field("preimage", &"<redacted>")
            .finish()
    }
}

/// Issues blockchain-anchored seeds.
pub struct EntropySource {
    chain: Arc<dyn BlockchainClient>,
    config: EntropyConfig,
}

impl EntropySource {
    pub fn new(chain: Arc<dyn BlockchainClient>, config: EntropyConfig) -> Self {
        Self { chain, config }
    }

    pub fn config(&self) -> &EntropyConfig {
        &self.config
    }

    /// Commit to a fresh random pre-image, anchored to a slot that has not
    /// finalized yet.
    pub async fn request_seed(&self) -> Result<PendingSeed, EntropyError> {
        let latest = self
            .with_retries(|| self.chain.latest_finalized_reference())
            .await
            .inspect_err(|e| {
                METRICS.inc_entropy_failures();
                obs::emit_entropy_unavailable(e);
            })?;
        let anchor = latest.ahead(self.config.lookahead_slots);

        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let preimage = Bytes32::new(bytes);

        let commitment = SeedCommitment {
            commitment_hash: commitment_for(&preimage),
            blockchain_reference: anchor,
            issued_at: Utc::now(),
        };
        METRICS.inc_seeds_committed();
        obs::emit_seed_committed(&commitment.commitment_hash, &anchor);

        Ok(PendingSeed {
            commitment,
            preimage,
        })
    }

    /// Wait for the anchor slot to finalize, then reveal.
    ///
    /// Consumes the pending seed whether or not the reveal succeeds.
    pub async fn resolve_seed(&self, pending: PendingSeed) -> Result<SeedProof, EntropyError> {
        let reference = pending.commitment.blockchain_reference;
        let started = Instant::now();
        let limit = Duration::from_millis(self.config.finality_timeout_ms);

        let block_value = match tokio::time::timeout(limit, self.await_finality(&reference)).await
        {
            Ok(result) => result,
            Err(_) => Err(EntropyError::FinalityTimeout {
                reference,
                waited_ms: self.config.finality_timeout_ms,
            }),
        }
        .inspect_err(|e| {
            METRICS.inc_entropy_failures();
            obs::emit_entropy_unavailable(e);
        })?;

        let waited_ms = started.elapsed().as_millis() as u64;
        let seed = derive_seed(&reference, &block_value, &pending.preimage);
        METRICS.inc_seeds_revealed();
        obs::emit_seed_revealed(&pending.commitment.commitment_hash, &reference, waited_ms);

        Ok(SeedProof {
            commitment_hash: pending.commitment.commitment_hash,
            blockchain_reference: reference,
            preimage: pending.preimage,
            block_value,
            seed,
            committed_at: pending.commitment.issued_at,
            revealed_at: Utc::now(),
        })
    }

    /// `true` iff `SHA-256(preimage) == commitment`.
    pub fn verify(commitment: &Bytes32, preimage: &[u8]) -> bool {
        verify_commitment(commitment, preimage)
    }

    /// Poll until the slot is finalized. Transient failures count against
    /// `max_attempts`; "not finalized yet" does not.
    async fn await_finality(&self, reference: &BlockReference) -> Result<Vec<u8>, EntropyError> {
        let poll = Duration::from_millis(self.config.finality_poll_ms);
        let mut failures = 0u32;

        loop {
            match self.chain.block_value(reference).await {
                Ok(value) => return Ok(value),
                Err(ChainError::NotFinalized { .. }) => {
                    debug!(reference = %reference, "anchor not finalized, polling");
                    tokio::time::sleep(poll).await;
                }
                Err(ChainError::Unavailable(reason)) => {
                    failures += 1;
                    if failures >= self.config.max_attempts.max(1) {
                        return Err(EntropyError::Unavailable {
                            attempts: failures,
                            reason,
                        });
                    }
                    tokio::time::sleep(self.config.backoff.delay_for(failures - 1)).await;
                }
                Err(err @ ChainError::Unusable { .. }) => {
                    return Err(EntropyError::AnchorRejected(err.to_string()));
                }
            }
        }
    }

    async fn with_retries<T, F, Fut>(&self, op: F) -> Result<T, EntropyError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(ChainError::Unavailable(reason)) => {
                    last_error = reason;
                    if attempt < max_attempts {
                        let delay = self.config.backoff.delay_for(attempt - 1);
                        debug!(attempt, delay_ms = delay.as_millis() as u64, error = %last_error, "chain read failed, backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(other) => return Err(EntropyError::AnchorRejected(other.to_string())),
            }
        }

        Err(EntropyError::Unavailable {
            attempts: max_attempts,
            reason: last_error,
        })
    }
}
