//! Spread registry and position resolution.

use serde::Serialize;

use arcana_state::DrawnCard;

use crate::domain::card;
use crate::sampler::Sample;

/// Spread used when a request names only a card count.
pub const FREE_DRAW: &str = "free_draw";

/// Spread used when a request names neither a spread nor a card count.
pub const DEFAULT_SPREAD: &str = "three_card";

/// Errors resolving a sample into a spread.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpreadError {
    #[error("unknown spread '{name}'")]
    Unknown { name: String },

    #[error("spread '{spread}' takes {expected} cards, got {actual}")]
    CountMismatch {
        spread: String,
        expected: usize,
        actual: usize,
    },

    #[error("card id {id} is not in the deck")]
    UnknownCard { id: u8 },
}

/// A registered spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Spread {
    pub name: &'static str,
    pub display_name: &'static str,
    pub positions: &'static [&'static str],
}

impl Spread {
    pub fn card_count(&self) -> usize {
        self.positions.len()
    }
}

pub static SPREADS: &[Spread] = &[
    Spread {
        name: "single_card",
        display_name: "Single Card",
        positions: &["Focus"],
    },
    Spread {
        name: "three_card",
        display_name: "Three Card Spread",
        positions: &["Past", "Present", "Future"],
    },
    Spread {
        name: "five_card",
        display_name: "Five Card Spread",
        positions: &["Present", "Past", "Future", "Reason", "Potential"],
    },
    Spread {
        name: "celtic_cross",
        display_name: "Celtic Cross",
        positions: &[
            "Present",
            "Challenge",
            "Past",
            "Future",
            "Above",
            "Below",
            "Advice",
            "External Influence",
            "Hopes/Fears",
            "Outcome",
        ],
    },
];

/// Look up a registered spread by name.
pub fn spread(name: &str) -> Option<&'static Spread> {
    SPREADS.iter().find(|s| s.name == name)
}

/// Position labels for a concrete draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub name: String,
    pub display_name: String,
    pub labels: Vec<String>,
}

impl Layout {
    /// Layout for a registered spread.
    pub fn named(name: &str) -> Result<Self, SpreadError> {
        let spread = spread(name).ok_or_else(|| SpreadError::Unknown {
            name: name.to_string(),
        })?;
        Ok(Self {
            name: spread.name.to_string(),
            display_name: spread.display_name.to_string(),
            labels: spread.positions.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Free-form layout labelled `Card 1..Card n`.
    pub fn free(count: usize) -> Self {
        Self {
            name: FREE_DRAW.to_string(),
            display_name: "Free Draw".to_string(),
            labels: (1..=count).map(|i| format!("Card {i}")).collect(),
        }
    }

    /// Layout for a stored spread name and card count.
    pub fn for_draw(name: &str, count: usize) -> Result<Self, SpreadError> {
        if name == FREE_DRAW {
            Ok(Self::free(count))
        } else {
            Self::named(name)
        }
    }

    /// Choose the layout for a request.
    ///
    /// - spread given: must be registered; a card count, if also given, must match
    /// - only a card count: free draw
    /// - neither: the three card spread
    pub fn plan(spread_name: Option<&str>, num_cards: Option<usize>) -> Result<Self, SpreadError> {
        match (spread_name, num_cards) {
            (Some(name), requested) => {
                let layout = Self::named(name)?;
                let expected = layout.card_count();
                match requested {
                    Some(actual) if actual != expected => Err(SpreadError::CountMismatch {
                        spread: layout.name,
                        expected,
                        actual,
                    }),
                    _ => Ok(layout),
                }
            }
            (None, Some(count)) => Ok(Self::free(count)),
            (None, None) => Self::named(DEFAULT_SPREAD),
        }
    }

    pub fn card_count(&self) -> usize {
        self.labels.len()
    }

    /// Zip sampled cards with position labels, in draw order.
    pub fn resolve(&self, cards: &[Sample]) -> Result<Vec<DrawnCard>, SpreadError> {
        if cards.len() != self.card_count() {
            return Err(SpreadError::CountMismatch {
                spread: self.name.clone(),
                expected: self.card_count(),
                actual: cards.len(),
            });
        }

        cards
            .iter()
            .zip(&self.labels)
            .map(|(&(id, orientation), label)| {
                let card = card(id).ok_or(SpreadError::UnknownCard { id })?;
                Ok(DrawnCard {
                    card_id: id,
                    card_name: card.name.clone(),
                    orientation,
                    position: label.clone(),
                })
            })
            .collect()
    }
}

/// Resolve `cards` into the named spread.
pub fn resolve(name: &str, cards: &[Sample]) -> Result<Vec<DrawnCard>, SpreadError> {
    Layout::for_draw(name, cards.len())?.resolve(cards)
}
