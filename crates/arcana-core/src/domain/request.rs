//! Transport-independent reading request and its validation rules.

use serde::{Deserialize, Serialize};

use arcana_state::Tier;

use crate::domain::error::ValidationError;
use crate::interpret::InterpretationOptions;

pub const QUESTION_MIN_CHARS: usize = 10;
pub const QUESTION_MAX_CHARS: usize = 250;
pub const MIN_CARDS: usize = 1;
pub const MAX_CARDS: usize = 10;

/// A request for a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRequest {
    pub question: String,
    #[serde(default)]
    pub num_cards: Option<usize>,
    #[serde(default)]
    pub spread: Option<String>,
    pub tier: Tier,
    #[serde(default)]
    pub options: InterpretationOptions,
}

impl ReadingRequest {
    pub fn new(question: impl Into<String>, tier: Tier) -> Self {
        Self {
            question: question.into(),
            num_cards: None,
            spread: None,
            tier,
            options: InterpretationOptions::default(),
        }
    }

    pub fn with_spread(mut self, spread: impl Into<String>) -> Self {
        self.spread = Some(spread.into());
        self
    }

    pub fn with_num_cards(mut self, num_cards: usize) -> Self {
        self.num_cards = Some(num_cards);
        self
    }

    pub fn with_options(mut self, options: InterpretationOptions) -> Self {
        self.options = options;
        self
    }

    /// Check question length and card count. Spread names are checked by
    /// the spread registry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_question(&self.question)?;
        if let Some(n) = self.num_cards {
            validate_card_count(n)?;
        }
        Ok(())
    }
}

/// Questions are measured in characters after trimming surrounding whitespace.
pub fn validate_question(question: &str) -> Result<(), ValidationError> {
    let chars = question.trim().chars().count();
    if !(QUESTION_MIN_CHARS..=QUESTION_MAX_CHARS).contains(&chars) {
        return Err(ValidationError::QuestionLength {
            chars,
            min: QUESTION_MIN_CHARS,
            max: QUESTION_MAX_CHARS,
        });
    }
    Ok(())
}

pub fn validate_card_count(requested: usize) -> Result<(), ValidationError> {
    if !(MIN_CARDS..=MAX_CARDS).contains(&requested) {
        return Err(ValidationError::CardCount {
            requested,
            min: MIN_CARDS,
            max: MAX_CARDS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_bounds() {
        assert!(validate_question("too short").is_err());
        assert!(validate_question("Will it rain?").is_ok());
        assert!(validate_question(&"x".repeat(250)).is_ok());
        assert!(validate_question(&"x".repeat(251)).is_err());
    }

    #[test]
    fn test_question_counts_chars_not_bytes() {
        // 10 multi-byte characters
        assert!(validate_question("ßßßßßßßßßß").is_ok());
        assert!(validate_question("   padded   ").is_err());
    }

    #[test]
    fn test_card_count_bounds() {
        assert!(validate_card_count(0).is_err());
        assert!(validate_card_count(1).is_ok());
        assert!(validate_card_count(10).is_ok());
        assert_eq!(
            validate_card_count(11),
            Err(ValidationError::CardCount {
                requested: 11,
                min: 1,
                max: 10
            })
        );
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let req: ReadingRequest = serde_json::from_value(serde_json::json!({
            "question": "What does my career path look like?",
            "numCards": 3,
            "spread": "three_card",
            "tier": "premium",
            "options": { "elaborateCards": true, "synthesisPasses": 2 }
        }))
        .unwrap();
        assert_eq!(req.num_cards, Some(3));
        assert_eq!(req.tier, Tier::Premium);
        assert!(req.options.elaborate_cards);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_eleven_cards() {
        let req = ReadingRequest::new("Where is this relationship going?", Tier::Free)
            .with_num_cards(11);
        assert!(matches!(
            req.validate(),
            Err(ValidationError::CardCount { requested: 11, .. })
        ));
    }
}
