//! Public draw verification.
//!
//! Everything here runs on public data only: a stored [`Draw`] and its
//! [`SeedProof`]. No server state or secrets are involved.

use serde::{Deserialize, Serialize};

use arcana_state::{Draw, SeedProof};

use crate::entropy::{derive_seed, verify_commitment, BlockchainClient, ChainError};
use crate::sampler;
use crate::spread::Layout;

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    /// First discrepancy found, when invalid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<String>,
}

impl Verification {
    pub fn valid() -> Self {
        Self {
            valid: true,
            mismatch: None,
        }
    }

    pub fn mismatch(detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            mismatch: Some(detail.into()),
        }
    }
}

/// Recompute the draw from `proof` and compare it with the stored cards.
///
/// Checks, in order: the commitment against the pre-image, the seed against
/// its derivation, then every card id, card name, orientation and position
/// label.
pub fn verify_draw(draw: &Draw, proof: &SeedProof) -> Verification {
    if !verify_commitment(&proof.commitment_hash, proof.preimage.as_bytes()) {
        return Verification::mismatch("commitment hash does not match the revealed pre-image");
    }

    let seed = derive_seed(&proof.blockchain_reference, &proof.block_value, &proof.preimage);
    if seed != proof.seed {
        return Verification::mismatch(format!(
            "seed {} does not match derivation {}",
            proof.seed.short(),
            seed.short()
        ));
    }

    let samples = match sampler::draw(seed.as_bytes(), draw.cards.len()) {
        Ok(samples) => samples,
        Err(err) => return Verification::mismatch(format!("stored draw is malformed: {err}")),
    };
    let expected = match Layout::for_draw(&draw.spread, samples.len())
        .and_then(|layout| layout.resolve(&samples))
    {
        Ok(cards) => cards,
        Err(err) => return Verification::mismatch(format!("stored spread is invalid: {err}")),
    };

    for (position, (want, got)) in expected.iter().zip(&draw.cards).enumerate() {
        if want.card_id != got.card_id
            || want.card_name != got.card_name
            || want.orientation != got.orientation
            || want.position != got.position
        {
            return Verification::mismatch(format!(
                "card {}: expected {} ({}) at {}, recorded {} ({}) at {}",
                position + 1,
                want.card_name,
                want.orientation,
                want.position,
                got.card_name,
                got.orientation,
                got.position,
            ));
        }
    }

    Verification::valid()
}

/// [`verify_draw`] plus a check that the recorded block value matches what
/// the auditor's own chain client reports for the anchor slot.
pub async fn audit_against_chain(
    chain: &dyn BlockchainClient,
    draw: &Draw,
    proof: &SeedProof,
) -> Result<Verification, ChainError> {
    let on_chain = chain.block_value(&proof.blockchain_reference).await?;
    if on_chain != proof.block_value {
        return Ok(Verification::mismatch(format!(
            "block value recorded for {} differs from the chain",
            proof.blockchain_reference
        )));
    }
    Ok(verify_draw(draw, proof))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use arcana_state::{BlockReference, Bytes32, DrawId, Orientation, RequesterId};

    use super::*;
    use crate::entropy::commitment_for;
    use crate::fakes::FixtureChain;
    use crate::spread;

    fn honest_draw(spread_name: &str, k: usize) -> Draw {
        let preimage = Bytes32::new([9; 32]);
        let reference = BlockReference::new(42);
        let block_value = FixtureChain::block_value_for(&reference);
        let seed = derive_seed(&reference, &block_value, &preimage);
        let cards = spread::resolve(spread_name, &sampler::draw(seed.as_bytes(), k).unwrap())
            .unwrap();
        Draw {
            id: DrawId::new(),
            requester: RequesterId::new("auditor"),
            spread: spread_name.to_string(),
            cards,
            proof: SeedProof {
                commitment_hash: commitment_for(&preimage),
                blockchain_reference: reference,
                preimage,
                block_value,
                seed,
                committed_at: Utc::now(),
                revealed_at: Utc::now(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_honest_draw_verifies() {
        for (name, k) in [("single_card", 1), ("three_card", 3), ("celtic_cross", 10)] {
            let draw = honest_draw(name, k);
            assert_eq!(verify_draw(&draw, &draw.proof), Verification::valid());
        }
    }

    #[test]
    fn test_swapped_card_is_detected() {
        let mut draw = honest_draw("three_card", 3);
        draw.cards.swap(0, 1);
        let result = verify_draw(&draw, &draw.proof);
        assert!(!result.valid);
        assert!(result.mismatch.unwrap().starts_with("card 1"));
    }

    #[test]
    fn test_flipped_orientation_is_detected() {
        let mut draw = honest_draw("five_card", 5);
        let last = draw.cards.last_mut().unwrap();
        last.orientation = match last.orientation {
            Orientation::Upright => Orientation::Reversed,
            Orientation::Reversed => Orientation::Upright,
        };
        let result = verify_draw(&draw, &draw.proof);
        assert!(result.mismatch.unwrap().starts_with("card 5"));
    }

    #[test]
    fn test_relabelled_position_is_detected() {
        let mut draw = honest_draw("three_card", 3);
        draw.cards[2].position = "Outcome".to_string();
        assert!(!verify_draw(&draw, &draw.proof).valid);
    }

    #[test]
    fn test_renamed_card_is_detected() {
        let mut draw = honest_draw("three_card", 3);
        let honest_name = draw.cards[0].card_name.clone();
        draw.cards[0].card_name = if honest_name == "The World" {
            "The Sun".to_string()
        } else {
            "The World".to_string()
        };
        let result = verify_draw(&draw, &draw.proof);
        assert!(!result.valid);
        let reason = result.mismatch.unwrap();
        assert!(reason.starts_with("card 1"));
        assert!(reason.contains(&honest_name));
    }

    #[test]
    fn test_forged_preimage_is_detected() {
        let draw = honest_draw("three_card", 3);
        let mut proof = draw.proof.clone();
        proof.preimage = Bytes32::new([1; 32]);
        let result = verify_draw(&draw, &proof);
        assert!(result.mismatch.unwrap().contains("commitment"));
    }

    #[test]
    fn test_forged_seed_is_detected() {
        let draw = honest_draw("three_card", 3);
        let mut proof = draw.proof.clone();
        proof.seed = Bytes32::sha256(b"chosen");
        assert!(verify_draw(&draw, &proof).mismatch.unwrap().contains("seed"));
    }

    #[tokio::test]
    async fn test_audit_against_chain() {
        let draw = honest_draw("three_card", 3);
        let chain = FixtureChain::new(100);
        assert!(audit_against_chain(&chain, &draw, &draw.proof).await.unwrap().valid);

        let mut proof = draw.proof.clone();
        proof.block_value = vec![0; 32];
        let result = audit_against_chain(&chain, &draw, &proof).await.unwrap();
        assert!(result.mismatch.unwrap().contains("differs from the chain"));
    }
}
