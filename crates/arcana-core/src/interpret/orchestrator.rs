//! Interpretation orchestration.
//!
//! Builds prompts for a draw, calls the provider under execution controls
//! and pool admission, enforces the tier plan and caches the outcome per
//! `(draw, question, plan)`. An optional sentiment analyzer tunes the prompts
//! to the querent's mood; its failure never degrades a reading.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use arcana_state::{Draw, InterpretationResult, ProviderMetadata, QuestionSentiment, Tier};

use super::admission::{PoolConfig, ProviderPool};
use super::cache::{question_hash, CacheKey, CacheOutcome, InterpretationCache};
use super::execution::{
    execute_with_controls, CircuitBreaker, Completion, ExecutionConfig, ExecutionError,
};
use super::prompt::PromptContext;
use super::provider::{AiProvider, ProviderOptions};
use super::sentiment::SentimentAnalyzer;
use super::tier::{InterpretationOptions, TierPlan};
use crate::domain::request::validate_question;
use crate::domain::ValidationError;
use crate::metrics::METRICS;
use crate::obs;

/// Shown in place of a synthesis when the provider could not be reached.
pub const DEGRADED_SYNTHESIS: &str = "The interpretation service is unavailable right now. \
The cards and their traditional meanings are shown for each position; \
ask again later for a full reading.";

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub execution: ExecutionConfig,
    pub pool: PoolConfig,
    pub provider: ProviderOptions,
    /// Completed interpretations kept in memory.
    pub cache_capacity: usize,
    /// Independently locked cache shards.
    pub cache_shards: usize,
    /// Upper bound on premium synthesis passes.
    pub max_premium_passes: u8,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            pool: PoolConfig::default(),
            provider: ProviderOptions::default(),
            cache_capacity: 1_024,
            cache_shards: 16,
            max_premium_passes: 3,
        }
    }
}

/// An interpretation request for an existing draw.
#[derive(Debug, Clone)]
pub struct InterpretationRequest {
    pub draw: Draw,
    pub question: String,
    pub tier: Tier,
    pub options: InterpretationOptions,
}

/// State shared with in-flight computations, which outlive any one caller.
struct Runtime {
    provider: Arc<dyn AiProvider>,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    config: OrchestratorConfig,
    breaker: CircuitBreaker,
    pool: ProviderPool,
}

/// Produces interpretations for draws.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct InterpretationOrchestrator {
    runtime: Arc<Runtime>,
    cache: InterpretationCache,
}

impl InterpretationOrchestrator {
    pub fn new(provider: Arc<dyn AiProvider>, config: OrchestratorConfig) -> Self {
        Self::assemble(provider, None, config)
    }

    /// Orchestrator whose prompts carry the querent's emotional state as
    /// read by `analyzer`.
    pub fn with_sentiment(
        provider: Arc<dyn AiProvider>,
        analyzer: Arc<dyn SentimentAnalyzer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self::assemble(provider, Some(analyzer), config)
    }

    fn assemble(
        provider: Arc<dyn AiProvider>,
        sentiment: Option<Arc<dyn SentimentAnalyzer>>,
        config: OrchestratorConfig,
    ) -> Self {
        let cache = InterpretationCache::new(config.cache_capacity, config.cache_shards);
        let runtime = Runtime {
            breaker: CircuitBreaker::from_config(&config.execution),
            pool: ProviderPool::new(&config.pool),
            provider,
            sentiment,
            config,
        };
        Self {
            runtime: Arc::new(runtime),
            cache,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.runtime.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.runtime.breaker
    }

    pub fn pool(&self) -> &ProviderPool {
        &self.runtime.pool
    }

    pub fn cache(&self) -> &InterpretationCache {
        &self.cache
    }

    /// The plan `tier` actually gets for `options`.
    pub fn plan(&self, tier: Tier, options: InterpretationOptions) -> TierPlan {
        TierPlan::enforce(tier, options, self.runtime.config.max_premium_passes)
    }

    /// Interpret a draw.
    ///
    /// Provider exhaustion yields a degraded result rather than an error.
    /// Dropping the returned future cancels the provider work unless another
    /// caller is waiting on the same key.
    #[instrument(skip_all, fields(draw_id = %request.draw.id, tier = %request.tier))]
    pub async fn interpret(
        &self,
        request: InterpretationRequest,
    ) -> Result<InterpretationResult, ValidationError> {
        validate_question(&request.question)?;

        let plan = self.plan(request.tier, request.options);
        let key = CacheKey::new(request.draw.id.clone(), &request.question, plan);
        let runtime = self.runtime.clone();

        let (result, outcome) = self
            .cache
            .get_or_compute(key, move || {
                runtime.compute(request.draw, request.question, plan).boxed()
            })
            .await;

        match outcome {
            CacheOutcome::Hit => METRICS.inc_cache_hits(),
            CacheOutcome::Joined => METRICS.inc_cache_joins(),
            CacheOutcome::Computed => {}
        }
        debug!(outcome = ?outcome, degraded = result.degraded, "interpretation served");

        Ok(result.as_ref().clone())
    }
}

/// Calls made so far for one interpretation.
#[derive(Debug, Default)]
struct Tally {
    billable: u32,
    attempts: u32,
}

impl Tally {
    fn record<T>(&mut self, outcome: &Result<Completion<T>, ExecutionError>) {
        match outcome {
            Ok(done) => {
                self.billable += 1;
                self.attempts += done.attempts;
                METRICS.inc_billable_calls();
            }
            Err(err) => self.attempts += err.attempts(),
        }
    }
}

impl Runtime {
    async fn compute(
        self: Arc<Self>,
        draw: Draw,
        question: String,
        plan: TierPlan,
    ) -> Arc<InterpretationResult> {
        let started = Instant::now();
        let sentiment = self.read_sentiment(&question).await;
        let mut context = PromptContext::for_draw(&draw, &question);
        if let Some(read) = &sentiment {
            context = context.with_emotional_state(read.emotion.clone());
        }
        let mut outcome = Outcome {
            per_position: context.static_texts(),
            sentiment,
            synthesis: None,
            passes: 0,
            elaborated: false,
            tally: Tally::default(),
        };

        // held until the interpretation finishes
        let Ok(_ticket) = self.pool.admit(plan.tier).await else {
            return self.finish(&draw, &question, plan, outcome, started);
        };

        if plan.elaborate_cards {
            outcome.elaborated = true;
            for index in 0..context.positions.len() {
                let call = self.call(plan.tier, context.elaboration(index)).await;
                outcome.tally.record(&call);
                match call {
                    Ok(done) => outcome.per_position[index] = done.value,
                    Err(err) => {
                        warn!(position = index, error = %err, "elaboration failed, keeping static meaning");
                        outcome.elaborated = false;
                        if matches!(err, ExecutionError::BreakerOpen { .. }) {
                            break;
                        }
                    }
                }
            }
        }

        for pass in 1..=plan.synthesis_passes {
            let prompt = context.synthesis(pass, outcome.synthesis.as_deref());
            let call = self.call(plan.tier, prompt).await;
            outcome.tally.record(&call);
            match call {
                Ok(done) => {
                    outcome.synthesis = Some(done.value);
                    outcome.passes = pass;
                }
                Err(err) => {
                    // an earlier pass, if any, still stands
                    warn!(pass, error = %err, "synthesis pass failed");
                    break;
                }
            }
        }

        self.finish(&draw, &question, plan, outcome, started)
    }

    /// The configured analyzer's reading of `question`, bounded by the
    /// provider timeout. Failures leave the prompt without an emotional state.
    async fn read_sentiment(&self, question: &str) -> Option<QuestionSentiment> {
        let analyzer = self.sentiment.as_ref()?;
        let limit_ms = self.config.execution.timeout_ms;
        match tokio::time::timeout(Duration::from_millis(limit_ms), analyzer.analyze(question)).await {
            Ok(Ok(read)) => {
                debug!(sentiment = %read.sentiment, emotion = %read.emotion, "question sentiment");
                Some(read)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "sentiment analysis failed, prompting without it");
                None
            }
            Err(_) => {
                warn!(limit_ms, "sentiment analysis timed out, prompting without it");
                None
            }
        }
    }

    /// One provider call under a pool permit and execution controls.
    async fn call(&self, tier: Tier, prompt: String) -> Result<Completion<String>, ExecutionError> {
        let _permit = self
            .pool
            .acquire_call(tier)
            .await
            .map_err(|_| ExecutionError::PoolClosed)?;

        let provider = &self.provider;
        let options = &self.config.provider;
        let prompt = prompt.as_str();
        execute_with_controls(&self.config.execution, &self.breaker, move |timeout: Duration| {
            provider.complete(prompt, options, timeout)
        })
        .await
    }

    fn finish(
        &self,
        draw: &Draw,
        question: &str,
        plan: TierPlan,
        outcome: Outcome,
        started: Instant,
    ) -> Arc<InterpretationResult> {
        let degraded = outcome.synthesis.is_none();
        let latency_ms = started.elapsed().as_millis() as u64;
        if degraded {
            METRICS.inc_degraded_readings();
        }
        obs::emit_interpretation_finished(
            &draw.id,
            plan.tier,
            latency_ms,
            outcome.tally.attempts,
            degraded,
        );

        Arc::new(InterpretationResult {
            draw_id: draw.id.clone(),
            question_hash: question_hash(question),
            per_position: outcome.per_position,
            synthesis: outcome
                .synthesis
                .unwrap_or_else(|| DEGRADED_SYNTHESIS.to_string()),
            provider: ProviderMetadata {
                provider: self.provider.name().to_string(),
                model: self.provider.model().map(str::to_string),
                tier: plan.tier,
                billable_calls: outcome.tally.billable,
                attempts: outcome.tally.attempts,
                synthesis_passes: outcome.passes,
                elaborated: outcome.elaborated,
            },
            latency_ms,
            degraded,
            sentiment: outcome.sentiment,
        })
    }
}

/// Partial interpretation assembled while calls complete.
struct Outcome {
    per_position: Vec<String>,
    sentiment: Option<QuestionSentiment>,
    synthesis: Option<String>,
    passes: u8,
    elaborated: bool,
    tally: Tally,
}
