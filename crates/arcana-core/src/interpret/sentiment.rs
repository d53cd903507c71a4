//! Question sentiment, used to set the tone of interpretation prompts.
//!
//! The analyzer is optional. When none is configured, or the configured one
//! fails, prompts simply omit the querent's emotional state.

use async_trait::async_trait;

use arcana_state::{QuestionSentiment, Sentiment};

use super::cache::question_hash;
use super::provider::ProviderError;

/// Classifies the mood of a question.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn analyze(&self, question: &str) -> Result<QuestionSentiment, ProviderError>;
}

const POSITIVE_WORDS: &[&str] = &[
    "better", "bright", "dream", "excited", "gain", "good", "great", "grow", "growth", "happy",
    "hope", "hopeful", "improve", "joy", "love", "lucky", "new", "opportunity", "peace",
    "promotion", "succeed", "success", "thrive", "win", "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "afraid", "alone", "angry", "anxious", "bad", "betrayed", "breakup", "debt", "divorce",
    "doubt", "fail", "failure", "fear", "fired", "hurt", "lonely", "lose", "loss", "lost", "pain",
    "problem", "regret", "sad", "scared", "sick", "stuck", "trouble", "worried", "worry", "wrong",
];

/// Word-list classifier. Needs no model and always answers.
///
/// The emotion word is picked from the question hash, so the same question
/// always produces the same prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
    pub fn classify(question: &str) -> QuestionSentiment {
        let (mut positive, mut negative) = (0u32, 0u32);
        for word in question
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            if POSITIVE_WORDS.binary_search(&word.as_str()).is_ok() {
                positive += 1;
            } else if NEGATIVE_WORDS.binary_search(&word.as_str()).is_ok() {
                negative += 1;
            }
        }

        let sentiment = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        };
        let total = positive + negative;
        let confidence_pct = if total == 0 || sentiment == Sentiment::Neutral {
            50
        } else {
            (50 + 50 * positive.abs_diff(negative) / total) as u8
        };

        let choices: &[&str] = match sentiment {
            Sentiment::Positive => &["hopeful", "optimistic", "excited"],
            Sentiment::Negative => &["concerned", "anxious", "worried"],
            Sentiment::Neutral => &["neutral"],
        };
        let pick = question_hash(question).as_bytes()[0] as usize % choices.len();

        QuestionSentiment {
            sentiment,
            confidence_pct,
            emotion: choices[pick].to_string(),
        }
    }
}

#[async_trait]
impl SentimentAnalyzer for LexiconAnalyzer {
    async fn analyze(&self, question: &str) -> Result<QuestionSentiment, ProviderError> {
        Ok(Self::classify(question))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_lists_are_sorted() {
        assert!(POSITIVE_WORDS.windows(2).all(|w| w[0] < w[1]));
        assert!(NEGATIVE_WORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_hopeful_question() {
        let read = LexiconAnalyzer::classify("Will my new business succeed and grow?");
        assert_eq!(read.sentiment, Sentiment::Positive);
        assert_eq!(read.confidence_pct, 100);
        assert!(["hopeful", "optimistic", "excited"].contains(&read.emotion.as_str()));
    }

    #[test]
    fn test_worried_question() {
        let read = LexiconAnalyzer::classify("I'm afraid I will LOSE my job. Is there hope?");
        assert_eq!(read.sentiment, Sentiment::Negative);
        assert_eq!(read.confidence_pct, 66);
        assert!(["concerned", "anxious", "worried"].contains(&read.emotion.as_str()));
    }

    #[test]
    fn test_plain_question_is_neutral() {
        let read = LexiconAnalyzer::classify("What does my career path look like?");
        assert_eq!(read.sentiment, Sentiment::Neutral);
        assert_eq!(read.confidence_pct, 50);
        assert_eq!(read.emotion, "neutral");
    }

    #[test]
    fn test_same_question_same_emotion() {
        let question = "Will I find love this year?";
        assert_eq!(
            LexiconAnalyzer::classify(question),
            LexiconAnalyzer::classify(question)
        );
    }
}
