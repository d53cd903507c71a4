//! Blockchain-anchored entropy.
//!
//! A seed is issued in two phases: [`EntropySource::request_seed`] commits to
//! a random pre-image and names a future slot, then
//! [`EntropySource::resolve_seed`] waits for that slot to finalize and mixes
//! its value into the seed.

pub mod chain;
pub mod commitment;
pub mod source;

pub use chain::{BlockchainClient, ChainError};
pub use commitment::{commitment_for, derive_seed, verify_commitment, verify_reveal, SEED_DOMAIN};
pub use source::{EntropyConfig, EntropyError, EntropySource, PendingSeed, SeedCommitment};
