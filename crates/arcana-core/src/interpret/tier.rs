//! Tier gating.
//!
//! Callers may ask for anything; what they get is decided here from the
//! tier alone.

use serde::{Deserialize, Serialize};

use arcana_state::Tier;

/// What the caller asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterpretationOptions {
    /// One provider-written paragraph per card instead of the static meaning.
    pub elaborate_cards: bool,
    /// Synthesis passes; each pass after the first refines the previous one.
    pub synthesis_passes: u8,
}

impl InterpretationOptions {
    pub fn elaborate(mut self) -> Self {
        self.elaborate_cards = true;
        self
    }

    pub fn with_passes(mut self, passes: u8) -> Self {
        self.synthesis_passes = passes;
        self
    }
}

/// What the caller gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierPlan {
    pub tier: Tier,
    pub elaborate_cards: bool,
    pub synthesis_passes: u8,
}

impl TierPlan {
    /// Clamp `requested` to what `tier` allows.
    ///
    /// Free: static per-card meanings and a single synthesis pass, regardless
    /// of options. Premium: elaboration on request, `1..=max_premium_passes`
    /// synthesis passes.
    pub fn enforce(tier: Tier, requested: InterpretationOptions, max_premium_passes: u8) -> Self {
        match tier {
            Tier::Free => Self {
                tier,
                elaborate_cards: false,
                synthesis_passes: 1,
            },
            Tier::Premium => Self {
                tier,
                elaborate_cards: requested.elaborate_cards,
                synthesis_passes: requested
                    .synthesis_passes
                    .clamp(1, max_premium_passes.max(1)),
            },
        }
    }

    /// Provider calls a full (non-degraded) interpretation needs.
    pub fn provider_calls(&self, cards: usize) -> usize {
        let elaborations = if self.elaborate_cards { cards } else { 0 };
        elaborations + self.synthesis_passes as usize
    }
}
