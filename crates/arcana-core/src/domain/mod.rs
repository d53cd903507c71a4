//! Domain models for Arcana.
//!
//! - `deck`: the 78-card reference deck
//! - `request`: reading request and validation
//! - `error`: domain error taxonomy

pub mod deck;
pub mod error;
pub mod request;

pub use deck::{card, deck, Arcana, Card, Suit, DECK_SIZE};
pub use error::{ArcanaError, Result, ValidationError};
pub use request::{ReadingRequest, MAX_CARDS, MIN_CARDS};
