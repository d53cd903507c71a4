//! Structured observability hooks for the reading lifecycle.
//!
//! This module provides:
//! - A reading-scoped tracing span, attached with `tracing::Instrument`
//! - Emission functions for key lifecycle events: seed commit/reveal,
//!   draw sampling, provider retries, interpretation completion, proof checks
//!
//! Events are emitted at `info!` level unless noted (filter with `ARCANA_LOG`).

use tracing::{info, warn};

use arcana_state::{BlockReference, Bytes32, DrawId, Tier};

/// Span carrying requester and tier for every event of one reading.
///
/// ```ignore
/// service.perform_inner(..).instrument(reading_span("alice", Tier::Free)).await
/// ```
pub fn reading_span(requester: &str, tier: Tier) -> tracing::Span {
    tracing::info_span!("arcana.reading", requester = %requester, tier = %tier)
}

pub fn emit_seed_committed(commitment: &Bytes32, reference: &BlockReference) {
    info!(
        event = "seed.committed",
        commitment = %commitment.short(),
        reference = %reference,
    );
}

pub fn emit_seed_revealed(commitment: &Bytes32, reference: &BlockReference, waited_ms: u64) {
    info!(
        event = "seed.revealed",
        commitment = %commitment.short(),
        reference = %reference,
        waited_ms = waited_ms,
    );
}

/// Warning level: the request fails and the commitment is discarded.
pub fn emit_entropy_unavailable(reason: &dyn std::fmt::Display) {
    warn!(event = "seed.unavailable", error = %reason);
}

pub fn emit_draw_sampled(draw_id: &DrawId, spread: &str, cards: usize) {
    info!(event = "draw.sampled", draw_id = %draw_id, spread = %spread, cards = cards);
}

pub fn emit_provider_retry(attempt: u32, delay_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "provider.retry",
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

pub fn emit_breaker_opened(consecutive_failures: u32) {
    warn!(event = "provider.breaker_open", consecutive_failures = consecutive_failures);
}

pub fn emit_interpretation_finished(
    draw_id: &DrawId,
    tier: Tier,
    latency_ms: u64,
    attempts: u32,
    degraded: bool,
) {
    info!(
        event = "interpretation.finished",
        draw_id = %draw_id,
        tier = %tier,
        latency_ms = latency_ms,
        attempts = attempts,
        degraded = degraded,
    );
}

pub fn emit_reading_completed(draw_id: &DrawId, duration_ms: u64, degraded: bool) {
    info!(
        event = "reading.completed",
        draw_id = %draw_id,
        duration_ms = duration_ms,
        degraded = degraded,
    );
}

pub fn emit_proof_checked(draw_id: &DrawId, valid: bool) {
    info!(event = "proof.checked", draw_id = %draw_id, valid = valid);
}

/// Warning level: persistence failed after the reading was produced.
pub fn emit_history_save_error(draw_id: &DrawId, error: &dyn std::fmt::Display) {
    warn!(event = "history.save_error", draw_id = %draw_id, error = %error);
}
