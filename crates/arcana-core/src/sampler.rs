//! Deterministic deck sampling.
//!
//! `draw(seed, k)` expands the seed into a counter-mode SHA-256 byte stream
//! and runs a partial Fisher-Yates shuffle over the 78 card indices, taking
//! one unbiased index per position by rejection sampling. The byte after each
//! index decides the orientation (low bit set = reversed).
//!
//! Stream block `i` is `SHA-256("arcana/stream/v1" || seed || i_be64)`.

use sha2::{Digest as Sha2Digest, Sha256};

use arcana_state::Orientation;

use crate::domain::request::validate_card_count;
use crate::domain::{ValidationError, DECK_SIZE};

/// Domain separator for stream expansion.
pub const STREAM_DOMAIN: &[u8] = b"arcana/stream/v1";

/// A sampled card: deck index and orientation.
pub type Sample = (u8, Orientation);

/// Unbounded pseudorandom byte stream derived from a seed.
pub struct DeckStream<'a> {
    seed: &'a [u8],
    counter: u64,
    block: [u8; 32],
    offset: usize,
    consumed: usize,
}

impl<'a> DeckStream<'a> {
    pub fn new(seed: &'a [u8]) -> Self {
        Self {
            seed,
            counter: 0,
            block: [0u8; 32],
            // forces a refill on first read
            offset: 32,
            consumed: 0,
        }
    }

    pub fn next_byte(&mut self) -> u8 {
        if self.offset == self.block.len() {
            self.refill();
        }
        let byte = self.block[self.offset];
        self.offset += 1;
        self.consumed += 1;
        byte
    }

    pub fn next_u32(&mut self) -> u32 {
        let bytes = [
            self.next_byte(),
            self.next_byte(),
            self.next_byte(),
            self.next_byte(),
        ];
        u32::from_be_bytes(bytes)
    }

    /// Uniform value in `0..n` with no modulo bias.
    pub fn uniform_below(&mut self, n: u32) -> u32 {
        assert!(n > 0, "uniform_below requires a non-empty range");
        // 2^32 mod n, computed without overflowing u32
        let rem = (u32::MAX % n + 1) % n;
        // values >= 2^32 - rem would favour the low residues
        let limit = u32::MAX - rem;
        loop {
            let v = self.next_u32();
            if rem == 0 || v <= limit {
                return v % n;
            }
        }
    }

    /// Bytes read so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    fn refill(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(STREAM_DOMAIN);
        hasher.update(self.seed);
        hasher.update(self.counter.to_be_bytes());
        self.block = hasher.finalize().into();
        self.counter += 1;
        self.offset = 0;
    }
}

/// Draw `k` distinct cards with orientations from `seed`.
///
/// Identical `(seed, k)` always yields the identical sequence.
///
/// # Panics
///
/// If the shuffle ever yields a duplicate or out-of-range index. That can
/// only happen if the stream expansion is broken and must never be papered
/// over.
pub fn draw(seed: &[u8], k: usize) -> Result<Vec<Sample>, ValidationError> {
    validate_card_count(k)?;

    let mut stream = DeckStream::new(seed);
    let mut indices: [u8; DECK_SIZE] = std::array::from_fn(|i| i as u8);
    let mut out = Vec::with_capacity(k);

    for i in 0..k {
        let remaining = (DECK_SIZE - i) as u32;
        let j = i + stream.uniform_below(remaining) as usize;
        indices.swap(i, j);
        let orientation = Orientation::from_bit(stream.next_byte() & 1 == 1);
        out.push((indices[i], orientation));
    }

    check_invariants(&out);
    Ok(out)
}

fn check_invariants(samples: &[Sample]) {
    let mut seen = [false; DECK_SIZE];
    for &(index, _) in samples {
        let index = index as usize;
        assert!(index < DECK_SIZE, "sampler produced out-of-range card {index}");
        assert!(!seen[index], "sampler produced duplicate card {index}");
        seen[index] = true;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::domain::card;

    #[test]
    fn test_draw_is_deterministic() {
        for k in 1..=10 {
            assert_eq!(draw(b"abc123", k).unwrap(), draw(b"abc123", k).unwrap());
        }
    }

    #[test]
    fn test_shorter_draw_is_a_prefix() {
        let ten = draw(b"prefix-seed", 10).unwrap();
        let three = draw(b"prefix-seed", 3).unwrap();
        assert_eq!(&ten[..3], &three[..]);
    }

    #[test]
    fn test_different_seeds_differ() {
        assert_ne!(draw(b"seed-a", 10).unwrap(), draw(b"seed-b", 10).unwrap());
    }

    #[test]
    fn test_no_duplicates_across_many_seeds() {
        for n in 0u32..2_000 {
            let cards = draw(&n.to_be_bytes(), 10).unwrap();
            let unique: HashSet<u8> = cards.iter().map(|(i, _)| *i).collect();
            assert_eq!(unique.len(), 10);
            assert!(cards.iter().all(|(i, _)| (*i as usize) < DECK_SIZE));
        }
    }

    #[test]
    fn test_card_count_is_validated() {
        assert!(matches!(draw(b"s", 0), Err(ValidationError::CardCount { .. })));
        assert!(matches!(draw(b"s", 11), Err(ValidationError::CardCount { .. })));
    }

    #[test]
    fn test_orientation_is_balanced() {
        let mut reversed = 0usize;
        let mut total = 0usize;
        for n in 0u32..5_000 {
            for (_, o) in draw(&n.to_le_bytes(), 10).unwrap() {
                total += 1;
                reversed += o.is_reversed() as usize;
            }
        }
        let ratio = reversed as f64 / total as f64;
        assert!((0.48..=0.52).contains(&ratio), "reversed ratio {ratio}");
    }

    #[test]
    fn test_first_card_is_roughly_uniform() {
        let mut counts = [0u32; DECK_SIZE];
        let trials = 78_000u32;
        for n in 0..trials {
            let (index, _) = draw(&n.to_be_bytes(), 1).unwrap()[0];
            counts[index as usize] += 1;
        }
        // expected 1000 per card; 6 sigma is about 190
        for (index, &count) in counts.iter().enumerate() {
            assert!((800..=1200).contains(&count), "card {index} drawn {count} times");
        }
    }

    #[test]
    fn test_uniform_below_stays_in_range() {
        let mut stream = DeckStream::new(b"range");
        for n in [1u32, 2, 3, 7, 78, 1 << 31, u32::MAX] {
            for _ in 0..200 {
                assert!(stream.uniform_below(n) < n);
            }
        }
    }

    #[test]
    fn test_stream_consumption_is_bounded() {
        let mut stream = DeckStream::new(b"consumption");
        for i in 0..10u32 {
            stream.uniform_below(78 - i);
            stream.next_byte();
        }
        // 5 bytes per card plus rare rejections
        assert!(stream.consumed() < 100);
    }

    #[test]
    fn test_stream_blocks_match_definition() {
        let mut stream = DeckStream::new(b"abc123");
        let first: Vec<u8> = (0..32).map(|_| stream.next_byte()).collect();

        let mut hasher = Sha256::new();
        hasher.update(STREAM_DOMAIN);
        hasher.update(b"abc123");
        hasher.update(0u64.to_be_bytes());
        assert_eq!(first, hasher.finalize().to_vec());
    }

    #[test]
    fn test_abc123_three_cards_are_stable() {
        let cards = draw(b"abc123", 3).unwrap();
        assert_eq!(cards.len(), 3);
        for (index, _) in &cards {
            assert!(card(*index).is_some());
        }
        assert_eq!(cards, draw(b"abc123", 3).unwrap());
    }

    #[test]
    #[should_panic(expected = "duplicate")]
    fn test_duplicate_is_fatal() {
        check_invariants(&[(4, Orientation::Upright), (4, Orientation::Reversed)]);
    }
}
