//! The 78-card reference deck.
//!
//! Card ids are stable and part of the public verification contract:
//! - `0..22`: major arcana in traditional order (The Fool = 0, The World = 21)
//! - `22..78`: minor arcana, suit-major (Wands, Cups, Swords, Pentacles),
//!   rank-minor (Ace = 1 .. King = 14)

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use arcana_state::Orientation;

/// Number of cards in the deck.
pub const DECK_SIZE: usize = 78;

/// Number of major arcana cards.
pub const MAJOR_ARCANA: usize = 22;

/// Major or minor arcana.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arcana {
    Major,
    Minor,
}

/// Minor arcana suits, in deck order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Wands, Suit::Cups, Suit::Swords, Suit::Pentacles];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Suit::Wands => "Wands",
            Suit::Cups => "Cups",
            Suit::Swords => "Swords",
            Suit::Pentacles => "Pentacles",
        };
        f.write_str(name)
    }
}

/// Immutable card reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: u8,
    pub name: String,
    pub arcana: Arcana,
    /// Present for minor arcana only
    pub suit: Option<Suit>,
    /// Major: 0..=21. Minor: 1 (Ace) ..= 14 (King)
    pub rank: u8,
    pub upright: &'static str,
    pub reversed: &'static str,
}

impl Card {
    /// The meaning that applies in the given orientation.
    pub fn meaning(&self, orientation: Orientation) -> &'static str {
        match orientation {
            Orientation::Upright => self.upright,
            Orientation::Reversed => self.reversed,
        }
    }
}

const MAJORS: [(&str, &str, &str); MAJOR_ARCANA] = [
    ("The Fool", "Beginnings, innocence, spontaneity, a free spirit", "Holding back, recklessness, risk-taking, uncertainty"),
    ("The Magician", "Manifestation, resourcefulness, power, inspired action", "Manipulation, poor planning, untapped talents"),
    ("The High Priestess", "Intuition, sacred knowledge, the subconscious mind", "Secrets, withdrawal, disconnected intuition"),
    ("The Empress", "Abundance, nurturing, fertility, nature", "Dependence, smothering, creative block"),
    ("The Emperor", "Authority, structure, stability, leadership", "Domination, rigidity, lack of discipline"),
    ("The Hierophant", "Tradition, conformity, spiritual wisdom, institutions", "Rebellion, subversiveness, new approaches"),
    ("The Lovers", "Love, harmony, relationships, aligned values, choices", "Disharmony, imbalance, misalignment of values"),
    ("The Chariot", "Control, willpower, determination, victory", "Lack of direction, opposition, lost self-discipline"),
    ("Strength", "Courage, compassion, inner strength, patience", "Self-doubt, weakness, insecurity"),
    ("The Hermit", "Introspection, solitude, inner guidance", "Isolation, loneliness, withdrawal"),
    ("Wheel of Fortune", "Cycles, fate, turning points, good luck", "Bad luck, resistance to change, breaking cycles"),
    ("Justice", "Fairness, truth, cause and effect, law", "Unfairness, dishonesty, lack of accountability"),
    ("The Hanged Man", "Surrender, new perspective, pause, letting go", "Delays, resistance, stalling, indecision"),
    ("Death", "Endings, transformation, transition, change", "Resistance to change, stagnation, fear of endings"),
    ("Temperance", "Balance, moderation, patience, purpose", "Imbalance, excess, lack of long-term vision"),
    ("The Devil", "Bondage, addiction, materialism, the shadow self", "Release, breaking free, reclaiming power"),
    ("The Tower", "Sudden upheaval, revelation, chaos, awakening", "Averting disaster, fear of change, delayed upheaval"),
    ("The Star", "Hope, renewal, faith, serenity", "Despair, disconnection, lack of faith"),
    ("The Moon", "Illusion, fear, anxiety, the subconscious", "Release of fear, clarity, repressed emotion surfacing"),
    ("The Sun", "Joy, success, vitality, positivity", "Temporary sadness, diminished enthusiasm, overoptimism"),
    ("Judgement", "Rebirth, reflection, inner calling, absolution", "Self-doubt, refusal of self-examination"),
    ("The World", "Completion, accomplishment, integration, travel", "Incompletion, lack of closure, shortcuts"),
];

const RANK_NAMES: [&str; 14] = [
    "Ace", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Page",
    "Knight", "Queen", "King",
];

/// (upright, reversed) per rank, one table per suit in `Suit::ALL` order.
const MINORS: [[(&str, &str); 14]; 4] = [
    // Wands
    [
        ("Inspiration, new opportunities, growth, potential", "Delays, lack of motivation, feeling weighed down"),
        ("Planning, future vision, decisions, discovery", "Fear of change, playing it safe, poor planning"),
        ("Expansion, foresight, progress, opportunities abroad", "Obstacles, delays, frustration, lack of foresight"),
        ("Celebration, harmony, homecoming, community", "Instability, lack of support, transition"),
        ("Competition, conflict, rivalry, tension", "Avoiding conflict, inner conflict, resolution"),
        ("Victory, public recognition, success, confidence", "Ego, fall from grace, lack of recognition"),
        ("Challenge, perseverance, defending your position", "Giving up, feeling overwhelmed, exhaustion"),
        ("Speed, rapid action, movement, swift change", "Delays, frustration, waiting, slowing down"),
        ("Resilience, persistence, a last stand, boundaries", "Paranoia, defensiveness, fatigue"),
        ("Burden, responsibility, hard work, stress", "Release, delegation, letting go of burdens"),
        ("Enthusiasm, exploration, discovery, a free spirit", "Setbacks to new ideas, hasty decisions"),
        ("Energy, passion, adventure, impulsiveness", "Recklessness, haste, scattered energy"),
        ("Courage, confidence, determination, vibrancy", "Self-doubt, jealousy, insecurity"),
        ("Leadership, vision, entrepreneurship, honour", "Impulsiveness, overbearing behaviour, high expectations"),
    ],
    // Cups
    [
        ("Love, new feelings, compassion, creativity", "Emotional loss, blocked creativity, emptiness"),
        ("Partnership, unity, mutual attraction", "Imbalance, broken communication, tension"),
        ("Friendship, celebration, community, collaboration", "Overindulgence, gossip, isolation"),
        ("Contemplation, apathy, reevaluation", "Sudden awareness, acceptance, new motivation"),
        ("Loss, grief, regret, disappointment", "Acceptance, moving on, forgiveness"),
        ("Nostalgia, childhood memories, innocence, reunion", "Living in the past, unrealistic memories"),
        ("Choices, illusion, wishful thinking, fantasy", "Clarity, alignment, sobering decisions"),
        ("Walking away, disillusionment, seeking deeper meaning", "Fear of change, aimless drifting, stagnation"),
        ("Contentment, satisfaction, wishes fulfilled", "Dissatisfaction, materialism, smugness"),
        ("Harmony, family, emotional fulfilment, alignment", "Disconnection, a broken home, misaligned values"),
        ("Curiosity, intuitive messages, creative beginnings", "Emotional immaturity, creative blocks"),
        ("Romance, charm, following the heart, idealism", "Moodiness, unrealistic expectations, jealousy"),
        ("Compassion, calm, emotional security, intuition", "Codependency, martyrdom, emotional overwhelm"),
        ("Emotional balance, diplomacy, generosity", "Manipulation, moodiness, emotional volatility"),
    ],
    // Swords
    [
        ("Clarity, breakthrough, truth, mental force", "Confusion, miscommunication, chaos"),
        ("Indecision, stalemate, difficult choices", "Information overload, the lesser of two evils, release"),
        ("Heartbreak, sorrow, grief, painful truth", "Recovery, forgiveness, moving on from pain"),
        ("Rest, recuperation, contemplation, retreat", "Restlessness, burnout, stagnation"),
        ("Conflict, defeat, winning at all costs", "Reconciliation, making amends, past resentment"),
        ("Transition, leaving behind, moving forward", "Resistance to change, unfinished business"),
        ("Deception, strategy, acting alone", "Confession, conscience, coming clean"),
        ("Restriction, self-imposed limits, feeling trapped", "Release, new perspective, freedom"),
        ("Anxiety, worry, nightmares, despair", "Hope, reaching out, inner turmoil easing"),
        ("Painful endings, betrayal, rock bottom", "Recovery, regeneration, resisting an inevitable end"),
        ("Curiosity, new ideas, vigilance, truth-seeking", "Gossip, all talk and no action, deception"),
        ("Ambition, action, drive, fast thinking", "Aggression, impulsiveness, lack of direction"),
        ("Independence, clear judgement, direct communication", "Coldness, bitterness, cruelty"),
        ("Intellect, authority, truth, ethical judgement", "Manipulation, tyranny, abuse of power"),
    ],
    // Pentacles
    [
        ("Prosperity, new financial opportunity, manifestation", "Lost opportunity, poor planning, scarcity"),
        ("Balance, adaptability, time management", "Overcommitment, disorganisation, imbalance"),
        ("Teamwork, craftsmanship, learning, collaboration", "Lack of teamwork, poor quality, disharmony"),
        ("Security, conservation, control, saving", "Greed, materialism, letting go of control"),
        ("Hardship, insecurity, isolation, worry", "Recovery from loss, the end of hard times"),
        ("Generosity, charity, sharing wealth", "Strings attached, debt, one-sided giving"),
        ("Patience, a long-term view, investment, perseverance", "Impatience, lack of reward, wasted effort"),
        ("Diligence, skill, mastery, dedication", "Perfectionism, lack of focus, uninspired work"),
        ("Abundance, independence, self-sufficiency", "Overwork, financial setbacks, hustling"),
        ("Legacy, wealth, family, long-term success", "Financial failure, loss, family disputes"),
        ("Ambition, diligence, a new venture, study", "Procrastination, lack of progress, missed lessons"),
        ("Hard work, routine, reliability, patience", "Boredom, stagnation, laziness"),
        ("Nurturing, practicality, abundance, comfort", "Self-neglect, imbalance between work and home"),
        ("Wealth, security, discipline, leadership", "Stubbornness, greed, obsession with status"),
    ],
];

fn build_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(DECK_SIZE);

    for (rank, &(name, upright, reversed)) in MAJORS.iter().enumerate() {
        cards.push(Card {
            id: rank as u8,
            name: name.to_string(),
            arcana: Arcana::Major,
            suit: None,
            rank: rank as u8,
            upright,
            reversed,
        });
    }

    for (suit_idx, suit) in Suit::ALL.iter().enumerate() {
        for (rank_idx, &(upright, reversed)) in MINORS[suit_idx].iter().enumerate() {
            cards.push(Card {
                id: cards.len() as u8,
                name: format!("{} of {}", RANK_NAMES[rank_idx], suit),
                arcana: Arcana::Minor,
                suit: Some(*suit),
                rank: rank_idx as u8 + 1,
                upright,
                reversed,
            });
        }
    }

    cards
}

/// The full deck, indexed by card id.
pub fn deck() -> &'static [Card] {
    static DECK: OnceLock<Vec<Card>> = OnceLock::new();
    DECK.get_or_init(build_deck)
}

/// Look up a card by id.
pub fn card(id: u8) -> Option<&'static Card> {
    deck().get(id as usize)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn deck_has_78_unique_cards() {
        let cards = deck();
        assert_eq!(cards.len(), DECK_SIZE);

        let names: HashSet<_> = cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), DECK_SIZE, "card names must be unique");

        for (idx, card) in cards.iter().enumerate() {
            assert_eq!(card.id as usize, idx, "card id must equal its index");
        }
    }

    #[test]
    fn arcana_split_is_22_and_56() {
        let majors = deck().iter().filter(|c| c.arcana == Arcana::Major).count();
        assert_eq!(majors, MAJOR_ARCANA);
        assert!(deck()
            .iter()
            .filter(|c| c.arcana == Arcana::Minor)
            .all(|c| c.suit.is_some() && (1..=14).contains(&c.rank)));
        assert!(deck()
            .iter()
            .filter(|c| c.arcana == Arcana::Major)
            .all(|c| c.suit.is_none()));
    }

    #[test]
    fn well_known_ids() {
        assert_eq!(card(0).unwrap().name, "The Fool");
        assert_eq!(card(21).unwrap().name, "The World");
        assert_eq!(card(22).unwrap().name, "Ace of Wands");
        assert_eq!(card(36).unwrap().name, "Ace of Cups");
        assert_eq!(card(77).unwrap().name, "King of Pentacles");
        assert!(card(78).is_none());
    }

    #[test]
    fn meaning_follows_orientation() {
        let fool = card(0).unwrap();
        assert!(fool.meaning(Orientation::Upright).contains("Beginnings"));
        assert!(fool.meaning(Orientation::Reversed).contains("recklessness"));
    }
}
