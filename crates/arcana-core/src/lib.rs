//! Arcana Core Library
//!
//! Verifiable card draws: blockchain-anchored commit/reveal seeds,
//! deterministic sampling, spread layouts, public proof verification and
//! resilient AI interpretation.

pub mod backoff;
pub mod config;
pub mod domain;
pub mod entropy;
pub mod fakes;
pub mod interpret;
pub mod metrics;
pub mod obs;
pub mod proof;
pub mod reading;
pub mod sampler;
pub mod spread;
pub mod telemetry;

pub use domain::{
    card, deck, Arcana, ArcanaError, Card, ReadingRequest, Result, Suit, ValidationError,
    DECK_SIZE, MAX_CARDS, MIN_CARDS,
};

pub use config::EngineConfig;

pub use entropy::{
    BlockchainClient, ChainError, EntropyConfig, EntropyError, EntropySource, PendingSeed,
    SeedCommitment,
};

pub use sampler::{draw, DeckStream, Sample};

pub use spread::{resolve, spread, Layout, Spread, SpreadError, SPREADS};

pub use proof::{audit_against_chain, verify_draw, Verification};

pub use interpret::{
    AiProvider, HttpAiProvider, HttpProviderConfig, InterpretationOptions,
    InterpretationOrchestrator, InterpretationRequest, LexiconAnalyzer, OrchestratorConfig,
    ProviderError, ProviderOptions, SentimentAnalyzer, TierPlan,
};

pub use reading::{PositionView, ProofSummary, ReadingResponse, ReadingService};

pub use metrics::METRICS;
pub use telemetry::init_tracing;

pub use arcana_state::{
    BlockReference, Bytes32, Draw, DrawId, DrawnCard, HistoryRecord, HistoryStore,
    InterpretationResult, Orientation, QuestionSentiment, RequesterId, SeedProof, Sentiment, Tier,
};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
