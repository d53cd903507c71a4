//! Record schema shared by the draw engine and history backends
//!
//! Records:
//! - `Draw`: an immutable, proof-carrying card draw
//! - `SeedProof`: the public commit/reveal data a draw was sampled from
//! - `InterpretationResult`: narrative attached to a draw
//! - `HistoryRecord`: what gets persisted per reading (append-only)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};

use crate::error::StorageError;

/// Hex (de)serialization for raw byte strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Bytes32
// ---------------------------------------------------------------------------

/// A 32-byte value (hash output, pre-image or seed), hex-encoded on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bytes32([u8; 32]);

impl Bytes32 {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// SHA-256 of `data`.
    pub fn sha256(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl FromStr for Bytes32 {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidHash {
            what: "32-byte hex value",
            value: s.to_string(),
        };
        let bytes = hex::decode(s).map_err(|_| invalid())?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| invalid())?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for Bytes32 {
    type Error = StorageError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Bytes32> for String {
    fn from(value: Bytes32) -> Self {
        value.to_hex()
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", self.short())
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Unique identifier for a draw (and the history record that carries it)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawId(pub String);

impl DrawId {
    /// Generate a new random DrawId
    pub fn new() -> Self {
        DrawId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for DrawId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DrawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of whoever requested a reading. Authentication happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(pub String);

impl RequesterId {
    pub fn new(id: impl Into<String>) -> Self {
        RequesterId(id.into())
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access level of the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Free => f.write_str("free"),
            Tier::Premium => f.write_str("premium"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Draw
// ---------------------------------------------------------------------------

/// Whether a drawn card faces up or is reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Upright,
    Reversed,
}

impl Orientation {
    /// `true` maps to reversed.
    pub fn from_bit(reversed: bool) -> Self {
        if reversed {
            Orientation::Reversed
        } else {
            Orientation::Upright
        }
    }

    pub fn is_reversed(&self) -> bool {
        matches!(self, Orientation::Reversed)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Upright => f.write_str("upright"),
            Orientation::Reversed => f.write_str("reversed"),
        }
    }
}

/// A finalized blockchain slot that anchors a seed reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockReference {
    pub slot: u64,
}

impl BlockReference {
    pub const fn new(slot: u64) -> Self {
        Self { slot }
    }

    /// The reference `lookahead` slots after this one.
    pub fn ahead(&self, lookahead: u64) -> Self {
        Self {
            slot: self.slot.saturating_add(lookahead),
        }
    }
}

impl fmt::Display for BlockReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}", self.slot)
    }
}

/// Public commit/reveal data. Everything needed to re-derive a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedProof {
    /// SHA-256 of the pre-image, published before the anchor slot finalized
    pub commitment_hash: Bytes32,
    /// Slot whose finalized value was mixed into the seed
    pub blockchain_reference: BlockReference,
    /// The revealed pre-image
    pub preimage: Bytes32,
    /// Finalized on-chain value for `blockchain_reference`
    #[serde(with = "hex_bytes")]
    pub block_value: Vec<u8>,
    /// Seed the deck was sampled from
    pub seed: Bytes32,
    pub committed_at: DateTime<Utc>,
    pub revealed_at: DateTime<Utc>,
}

/// One card in a draw, in draw order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnCard {
    pub card_id: u8,
    pub card_name: String,
    pub orientation: Orientation,
    pub position: String,
}

/// An immutable card draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub id: DrawId,
    pub requester: RequesterId,
    pub spread: String,
    pub cards: Vec<DrawnCard>,
    pub proof: SeedProof,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Provenance of an interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider name (e.g. "http", "scripted")
    pub provider: String,
    /// Model identifier, when the provider reports one
    pub model: Option<String>,
    /// Tier the interpretation was produced for
    pub tier: Tier,
    /// Successful provider completions (the billable ones)
    pub billable_calls: u32,
    /// Provider attempts including retries
    pub attempts: u32,
    pub synthesis_passes: u8,
    pub elaborated: bool,
}

/// Polarity of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => f.write_str("positive"),
            Sentiment::Negative => f.write_str("negative"),
            Sentiment::Neutral => f.write_str("neutral"),
        }
    }
}

/// How the querent appears to feel, read from the question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSentiment {
    pub sentiment: Sentiment,
    /// 0 to 100
    pub confidence_pct: u8,
    /// Single word passed to the provider, e.g. "hopeful"
    pub emotion: String,
}

/// Narrative attached to a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretationResult {
    pub draw_id: DrawId,
    /// SHA-256 of the question text
    pub question_hash: Bytes32,
    /// One text per drawn card, in draw order
    pub per_position: Vec<String>,
    pub synthesis: String,
    pub provider: ProviderMetadata,
    pub latency_ms: u64,
    /// `true` when the provider was unavailable and `synthesis` is a placeholder
    pub degraded: bool,
    /// Question sentiment the prompts were tuned with, if it was analyzed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<QuestionSentiment>,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// A persisted reading: the draw, the question and its interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub draw: Draw,
    pub question: String,
    pub tier: Tier,
    pub interpretation: Option<InterpretationResult>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn id(&self) -> &DrawId {
        &self.draw.id
    }

    pub fn owner(&self) -> &RequesterId {
        &self.draw.requester
    }
}
