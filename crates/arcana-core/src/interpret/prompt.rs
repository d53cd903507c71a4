//! Prompt construction.

use std::fmt::Write as _;

use arcana_state::{Draw, Orientation};

use crate::domain::card;
use crate::spread::Layout;

pub const SYSTEM_PREAMBLE: &str = "You are an expert tarot reader with deep knowledge of symbolism and psychology. \
Your interpretations are insightful, nuanced and respectful of the querent's circumstances. \
Based on the cards drawn and their positions, give an interpretation that is helpful and clear.";

/// One drawn card as the provider sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionContext {
    pub position: String,
    pub card: String,
    pub orientation: Orientation,
    pub meaning: &'static str,
}

impl PositionContext {
    /// The text a free reading shows for this position.
    pub fn static_text(&self) -> String {
        format!("{} ({}): {}", self.card, self.orientation, self.meaning)
    }
}

/// Everything a prompt is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub question: String,
    /// One-word mood of the querent, when it was analyzed.
    pub emotional_state: Option<String>,
    pub spread: String,
    pub positions: Vec<PositionContext>,
}

impl PromptContext {
    pub fn for_draw(draw: &Draw, question: &str) -> Self {
        let spread = Layout::for_draw(&draw.spread, draw.cards.len())
            .map(|layout| layout.display_name)
            .unwrap_or_else(|_| draw.spread.clone());

        let positions = draw
            .cards
            .iter()
            .map(|drawn| PositionContext {
                position: drawn.position.clone(),
                card: drawn.card_name.clone(),
                orientation: drawn.orientation,
                meaning: card(drawn.card_id)
                    .map(|c| c.meaning(drawn.orientation))
                    .unwrap_or(""),
            })
            .collect();

        Self {
            question: question.trim().to_string(),
            emotional_state: None,
            spread,
            positions,
        }
    }

    pub fn with_emotional_state(mut self, emotion: impl Into<String>) -> Self {
        self.emotional_state = Some(emotion.into());
        self
    }

    pub fn static_texts(&self) -> Vec<String> {
        self.positions.iter().map(PositionContext::static_text).collect()
    }

    fn header(&self) -> String {
        let mut out = format!("{SYSTEM_PREAMBLE}\n\nQuestion: {}\n", self.question);
        if let Some(emotion) = &self.emotional_state {
            let _ = writeln!(out, "Querent's emotional state: {emotion}");
        }
        let _ = write!(out, "\nSpread: {}\n\n", self.spread);
        for p in &self.positions {
            let _ = writeln!(out, "{}: {} ({}) - {}", p.position, p.card, p.orientation, p.meaning);
        }
        out
    }

    /// Prompt for synthesis pass `pass` (1-based). Later passes refine `previous`.
    pub fn synthesis(&self, pass: u8, previous: Option<&str>) -> String {
        let mut out = self.header();
        match previous {
            Some(draft) if pass > 1 => {
                let _ = write!(
                    out,
                    "\nA previous reading of these cards:\n{draft}\n\n\
                     Deepen and refine it. Connect the positions to each other and to the question:"
                );
            }
            _ => out.push_str("\nProvide a detailed tarot interpretation:"),
        }
        out
    }

    /// Prompt elaborating one position.
    pub fn elaboration(&self, index: usize) -> String {
        let mut out = self.header();
        if let Some(p) = self.positions.get(index) {
            let _ = write!(
                out,
                "\nFocus only on the {} position. Explain what {} ({}) says about the question in this position:",
                p.position, p.card, p.orientation
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use arcana_state::{BlockReference, Bytes32, DrawId, DrawnCard, RequesterId, SeedProof};

    use super::*;

    fn draw() -> Draw {
        Draw {
            id: DrawId::new(),
            requester: RequesterId::new("r"),
            spread: "three_card".to_string(),
            cards: vec![
                DrawnCard {
                    card_id: 0,
                    card_name: "The Fool".to_string(),
                    orientation: Orientation::Upright,
                    position: "Past".to_string(),
                },
                DrawnCard {
                    card_id: 1,
                    card_name: "The Magician".to_string(),
                    orientation: Orientation::Upright,
                    position: "Present".to_string(),
                },
                DrawnCard {
                    card_id: 7,
                    card_name: "The Chariot".to_string(),
                    orientation: Orientation::Reversed,
                    position: "Future".to_string(),
                },
            ],
            proof: SeedProof {
                commitment_hash: Bytes32::sha256(b"p"),
                blockchain_reference: BlockReference::new(1),
                preimage: Bytes32::new([0; 32]),
                block_value: vec![],
                seed: Bytes32::sha256(b"s"),
                committed_at: Utc::now(),
                revealed_at: Utc::now(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_lists_positions_in_order() {
        let ctx = PromptContext::for_draw(&draw(), "  What does my career path look like?  ");
        let prompt = ctx.synthesis(1, None);
        assert!(prompt.starts_with(SYSTEM_PREAMBLE));
        assert!(prompt.contains("Question: What does my career path look like?\n"));
        assert!(prompt.contains("Spread: Three Card Spread"));
        let past = prompt.find("Past: The Fool (upright)").unwrap();
        let future = prompt.find("Future: The Chariot (reversed)").unwrap();
        assert!(past < future);
    }

    #[test]
    fn test_emotional_state_follows_question() {
        let plain = PromptContext::for_draw(&draw(), "Will my new job bring growth?");
        assert!(!plain.synthesis(1, None).contains("emotional state"));

        let toned = plain.with_emotional_state("hopeful");
        let prompt = toned.synthesis(1, None);
        assert!(prompt.contains(
            "Question: Will my new job bring growth?\nQuerent's emotional state: hopeful\n\nSpread: Three Card Spread"
        ));
        assert!(toned.elaboration(0).contains("Querent's emotional state: hopeful"));
    }

    #[test]
    fn test_refinement_includes_previous_draft() {
        let ctx = PromptContext::for_draw(&draw(), "What does my career path look like?");
        let prompt = ctx.synthesis(2, Some("first draft"));
        assert!(prompt.contains("first draft"));
        assert!(prompt.contains("refine"));
    }

    #[test]
    fn test_static_text_uses_orientation_meaning() {
        let ctx = PromptContext::for_draw(&draw(), "What does my career path look like?");
        let texts = ctx.static_texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("The Fool (upright): Beginnings"));
        assert!(texts[2].contains("(reversed)"));
    }

    #[test]
    fn test_elaboration_names_position() {
        let ctx = PromptContext::for_draw(&draw(), "What does my career path look like?");
        assert!(ctx.elaboration(1).contains("the Present position"));
    }
}
