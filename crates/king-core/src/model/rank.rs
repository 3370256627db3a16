use core::fmt;
use serde::{Deserialize, Serialize};

/// Card rank; the discriminant is the rank's trick-taking value, aces high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

const SYMBOLS: [&str; 13] = ["2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K", "A"];

impl Rank {
    pub const ORDERED: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub const fn from_value(value: u8) -> Option<Self> {
        if value < 2 || value > 14 {
            return None;
        }
        Some(Self::ORDERED[(value - 2) as usize])
    }

    /// Parses `2`..`14` or the court letters `J`, `Q`, `K`, `A`.
    pub fn parse(text: &str) -> Option<Self> {
        let upper = text.to_ascii_uppercase();
        match SYMBOLS[9..].iter().position(|&symbol| symbol == upper) {
            Some(offset) => Some(Self::ORDERED[9 + offset]),
            None => upper.parse::<u8>().ok().and_then(Self::from_value),
        }
    }

    pub const fn value(self) -> u8 {
        self as u8
    }

    pub const fn symbol(self) -> &'static str {
        SYMBOLS[(self as u8 - 2) as usize]
    }

    /// Jacks and kings count as "men" in the Homens round.
    pub const fn is_man(self) -> bool {
        matches!(self, Rank::Jack | Rank::King)
    }

    /// Queens count as "women" in the Mulheres round.
    pub const fn is_woman(self) -> bool {
        matches!(self, Rank::Queen)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
