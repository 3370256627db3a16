use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Dense identifier in `0..52`, suit-major.
    pub const fn to_id(self) -> u8 {
        self.suit as u8 * 13 + (self.rank as u8 - 2)
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        if id >= 52 {
            return None;
        }
        let suit = match Suit::from_index((id / 13) as usize) {
            Some(suit) => suit,
            None => return None,
        };
        match Rank::from_value(id % 13 + 2) {
            Some(rank) => Some(Self::new(rank, suit)),
            None => None,
        }
    }

    pub const fn is_man(self) -> bool {
        self.rank.is_man()
    }

    pub const fn is_woman(self) -> bool {
        self.rank.is_woman()
    }

    pub const fn is_king_of_hearts(self) -> bool {
        matches!(self.rank, Rank::King) && matches!(self.suit, Suit::Hearts)
    }

    /// Ordering used for deterministic tie-breaks: rank first, then suit.
    pub fn tie_break_key(self) -> (u8, u8) {
        (self.rank.value(), self.suit as u8)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCardError(String);

impl fmt::Display for ParseCardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid card text '{}'", self.0)
    }
}

impl std::error::Error for ParseCardError {}

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let mut chars = trimmed.chars();
        let suit_char = chars
            .next_back()
            .ok_or_else(|| ParseCardError(text.to_string()))?;
        let suit = Suit::from_char(suit_char).ok_or_else(|| ParseCardError(text.to_string()))?;
        let rank = Rank::parse(chars.as_str()).ok_or_else(|| ParseCardError(text.to_string()))?;
        Ok(Card::new(rank, suit))
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

impl TryFrom<String> for Card {
    type Error = ParseCardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
