//! AI interpretation of draws.
//!
//! - `provider`: the injected [`AiProvider`] trait
//! - `execution`: timeout, retry and circuit breaker around provider calls
//! - `admission`: provider pool with premium reservation
//! - `cache`: sharded single-flight result cache
//! - `tier`: server-side tier enforcement
//! - `prompt`: prompt construction
//! - `sentiment`: optional question mood analysis for prompt tone
//! - `orchestrator`: ties the above together
//! - `http`: reqwest-backed provider

pub mod admission;
pub mod cache;
pub mod execution;
pub mod http;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod sentiment;
pub mod tier;

pub use admission::{PoolConfig, ProviderPool};
pub use cache::{question_hash, CacheKey, CacheOutcome, InterpretationCache};
pub use execution::{execute_with_controls, CircuitBreaker, ExecutionConfig, ExecutionError};
pub use http::{HttpAiProvider, HttpProviderConfig};
pub use orchestrator::{
    InterpretationOrchestrator, InterpretationRequest, OrchestratorConfig, DEGRADED_SYNTHESIS,
};
pub use prompt::PromptContext;
pub use provider::{AiProvider, ProviderError, ProviderOptions};
pub use sentiment::{LexiconAnalyzer, SentimentAnalyzer};
pub use tier::{InterpretationOptions, TierPlan};
