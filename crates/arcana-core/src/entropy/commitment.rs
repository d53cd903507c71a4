//! The public verification contract.
//!
//! Anyone holding a `SeedProof` can recompute every value below. Changing
//! any of these functions invalidates all previously issued proofs.
//!
//! - commitment: `SHA-256(preimage)`
//! - seed: `SHA-256("arcana/seed/v1" || slot_be64 || len_be64(block_value) || block_value || preimage)`

use sha2::{Digest as Sha2Digest, Sha256};

use arcana_state::{BlockReference, Bytes32, SeedProof};

/// Domain separator for seed derivation.
pub const SEED_DOMAIN: &[u8] = b"arcana/seed/v1";

/// Commitment to a pre-image.
pub fn commitment_for(preimage: &Bytes32) -> Bytes32 {
    Bytes32::sha256(preimage.as_bytes())
}

/// `true` iff `SHA-256(preimage) == commitment`.
pub fn verify_commitment(commitment: &Bytes32, preimage: &[u8]) -> bool {
    Bytes32::sha256(preimage) == *commitment
}

/// Combine the finalized on-chain value with the committed pre-image.
pub fn derive_seed(reference: &BlockReference, block_value: &[u8], preimage: &Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(reference.slot.to_be_bytes());
    hasher.update((block_value.len() as u64).to_be_bytes());
    hasher.update(block_value);
    hasher.update(preimage.as_bytes());
    Bytes32::new(hasher.finalize().into())
}

/// Commitment matches the pre-image and the stored seed matches its derivation.
pub fn verify_reveal(proof: &SeedProof) -> bool {
    verify_commitment(&proof.commitment_hash, proof.preimage.as_bytes())
        && derive_seed(&proof.blockchain_reference, &proof.block_value, &proof.preimage)
            == proof.seed
}
