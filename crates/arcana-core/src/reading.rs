//! End-to-end readings: validate, commit, reveal, sample, lay out,
//! interpret, persist.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::Instrument;

use arcana_state::{
    BlockReference, Bytes32, Draw, DrawId, HistoryRecord, HistoryStore, InterpretationResult,
    Orientation, RequesterId, Tier,
};

use crate::domain::{ReadingRequest, Result};
use crate::entropy::EntropySource;
use crate::interpret::{InterpretationOptions, InterpretationOrchestrator, InterpretationRequest};
use crate::metrics::METRICS;
use crate::obs;
use crate::proof::{verify_draw, Verification};
use crate::sampler;
use crate::spread::Layout;

/// One position of a reading as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub label: String,
    pub card: String,
    pub orientation: Orientation,
    pub text: String,
}

/// The public part of the seed proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSummary {
    pub commitment_hash: Bytes32,
    pub blockchain_reference: BlockReference,
}

/// A finished reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    pub draw_id: DrawId,
    pub spread: String,
    pub positions: Vec<PositionView>,
    pub synthesis: String,
    pub proof: ProofSummary,
    pub degraded: bool,
    /// Whether the reading reached the history store. An unrecorded reading
    /// cannot be fetched, verified or re-interpreted later.
    pub recorded: bool,
}

impl ReadingResponse {
    pub fn new(draw: &Draw, interpretation: &InterpretationResult) -> Self {
        let positions = draw
            .cards
            .iter()
            .zip(&interpretation.per_position)
            .map(|(card, text)| PositionView {
                label: card.position.clone(),
                card: card.card_name.clone(),
                orientation: card.orientation,
                text: text.clone(),
            })
            .collect();

        Self {
            draw_id: draw.id.clone(),
            spread: draw.spread.clone(),
            positions,
            synthesis: interpretation.synthesis.clone(),
            proof: ProofSummary {
                commitment_hash: draw.proof.commitment_hash,
                blockchain_reference: draw.proof.blockchain_reference,
            },
            degraded: interpretation.degraded,
            recorded: true,
        }
    }
}

/// Runs readings against injected collaborators.
pub struct ReadingService {
    entropy: EntropySource,
    orchestrator: Arc<InterpretationOrchestrator>,
    history: Arc<dyn HistoryStore>,
}

impl ReadingService {
    pub fn new(
        entropy: EntropySource,
        orchestrator: Arc<InterpretationOrchestrator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            entropy,
            orchestrator,
            history,
        }
    }

    pub fn orchestrator(&self) -> &Arc<InterpretationOrchestrator> {
        &self.orchestrator
    }

    /// Perform a reading for `requester`.
    ///
    /// Nothing is committed until the request validates and its spread
    /// resolves. Entropy failures abort the reading before a draw exists.
    /// Provider failures produce a degraded narrative instead of an error.
    pub async fn perform(
        &self,
        requester: &RequesterId,
        request: ReadingRequest,
    ) -> Result<ReadingResponse> {
        let span = obs::reading_span(&requester.0, request.tier);
        self.perform_inner(requester, request).instrument(span).await
    }

    async fn perform_inner(
        &self,
        requester: &RequesterId,
        request: ReadingRequest,
    ) -> Result<ReadingResponse> {
        let started = Instant::now();
        request.validate()?;
        let layout = Layout::plan(request.spread.as_deref(), request.num_cards)?;

        let pending = self.entropy.request_seed().await?;
        let proof = self.entropy.resolve_seed(pending).await?;

        let samples = sampler::draw(proof.seed.as_bytes(), layout.card_count())?;
        let cards = layout.resolve(&samples)?;
        let draw = Draw {
            id: DrawId::new(),
            requester: requester.clone(),
            spread: layout.name.clone(),
            cards,
            proof,
            created_at: Utc::now(),
        };
        METRICS.inc_draws_sampled();
        obs::emit_draw_sampled(&draw.id, &draw.spread, draw.cards.len());

        let interpretation = self
            .orchestrator
            .interpret(InterpretationRequest {
                draw: draw.clone(),
                question: request.question.clone(),
                tier: request.tier,
                options: request.options,
            })
            .await?;

        let mut response = ReadingResponse::new(&draw, &interpretation);
        let record = HistoryRecord {
            draw,
            question: request.question,
            tier: request.tier,
            interpretation: Some(interpretation),
            recorded_at: Utc::now(),
        };
        if let Err(err) = self.history.save(record).await {
            obs::emit_history_save_error(&response.draw_id, &err);
            response.recorded = false;
        }

        obs::emit_reading_completed(
            &response.draw_id,
            started.elapsed().as_millis() as u64,
            response.degraded,
        );
        Ok(response)
    }

    /// Every reading `owner` has recorded, oldest first.
    pub async fn history(&self, owner: &RequesterId) -> Result<Vec<HistoryRecord>> {
        Ok(self.history.list_by_owner(owner).await?)
    }

    /// One of `owner`'s readings.
    pub async fn reading(&self, id: &DrawId, owner: &RequesterId) -> Result<HistoryRecord> {
        Ok(self.history.get_by_id(id, owner).await?)
    }

    /// Interpret a stored draw again, for a new question or a higher tier.
    /// The stored record is left untouched.
    pub async fn reinterpret(
        &self,
        id: &DrawId,
        owner: &RequesterId,
        question: &str,
        tier: Tier,
        options: InterpretationOptions,
    ) -> Result<ReadingResponse> {
        let record = self.reading(id, owner).await?;
        let interpretation = self
            .orchestrator
            .interpret(InterpretationRequest {
                draw: record.draw.clone(),
                question: question.to_string(),
                tier,
                options,
            })
            .instrument(obs::reading_span(&owner.0, tier))
            .await?;
        Ok(ReadingResponse::new(&record.draw, &interpretation))
    }

    /// Check one of `owner`'s stored readings against its proof.
    pub async fn verify(&self, id: &DrawId, owner: &RequesterId) -> Result<Verification> {
        let record = self.reading(id, owner).await?;
        let verification = verify_draw(&record.draw, &record.draw.proof);
        obs::emit_proof_checked(id, verification.valid);
        Ok(verification)
    }
}
