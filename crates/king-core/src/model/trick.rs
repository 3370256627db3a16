use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::player::PlayerPosition;
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trick {
    leader: PlayerPosition,
    plays: Vec<Play>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Play {
    pub position: PlayerPosition,
    pub card: Card,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrickError {
    TrickComplete,
    OutOfTurn {
        expected: PlayerPosition,
        actual: PlayerPosition,
    },
    AlreadyPlayed(PlayerPosition),
    DuplicateCard(Card),
}

impl fmt::Display for TrickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrickError::TrickComplete => write!(f, "trick already complete"),
            TrickError::OutOfTurn { expected, actual } => {
                write!(f, "expected {expected} to play next but got {actual}")
            }
            TrickError::AlreadyPlayed(position) => {
                write!(f, "{position} has already played this trick")
            }
            TrickError::DuplicateCard(card) => write!(f, "{card} was already played this trick"),
        }
    }
}

impl std::error::Error for TrickError {}

impl Trick {
    pub fn new(leader: PlayerPosition) -> Self {
        Self {
            leader,
            plays: Vec::with_capacity(4),
        }
    }

    /// Rebuilds a trick from plays already made, validating turn order.
    pub fn from_plays(leader: PlayerPosition, plays: &[(PlayerPosition, Card)]) -> Result<Self, TrickError> {
        let mut trick = Self::new(leader);
        for &(position, card) in plays {
            trick.play(position, card)?;
        }
        Ok(trick)
    }

    pub fn leader(&self) -> PlayerPosition {
        self.leader
    }

    pub fn plays(&self) -> &[Play] {
        &self.plays
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.plays.len() == 4
    }

    /// The required suit, fixed by the first card played.
    pub fn lead_suit(&self) -> Option<Suit> {
        self.plays.first().map(|play| play.card.suit)
    }

    pub fn cards(&self) -> CardSet {
        CardSet::from_cards(self.plays.iter().map(|play| play.card))
    }

    /// Seat due to play next, or `None` once all four have played.
    pub fn next_to_act(&self) -> Option<PlayerPosition> {
        if self.is_complete() {
            None
        } else {
            Some(self.expected_position())
        }
    }

    /// Seats still to act, in seating order.
    pub fn remaining_actors(&self) -> Vec<PlayerPosition> {
        let mut seat = self.expected_position();
        let mut actors = Vec::with_capacity(4 - self.plays.len());
        for _ in self.plays.len()..4 {
            actors.push(seat);
            seat = seat.next();
        }
        actors
    }

    pub fn play(&mut self, position: PlayerPosition, card: Card) -> Result<(), TrickError> {
        if self.is_complete() {
            return Err(TrickError::TrickComplete);
        }

        if self.plays.iter().any(|play| play.position == position) {
            return Err(TrickError::AlreadyPlayed(position));
        }

        if self.plays.iter().any(|play| play.card == card) {
            return Err(TrickError::DuplicateCard(card));
        }

        let expected = self.expected_position();
        if expected != position {
            return Err(TrickError::OutOfTurn {
                expected,
                actual: position,
            });
        }

        self.plays.push(Play { position, card });
        Ok(())
    }

    /// Play currently winning the trick: the highest trump when one is set and has been
    /// played, else the highest card of the required suit. Works on partial tricks.
    pub fn winning_play(&self, trump: Option<Suit>) -> Option<Play> {
        let lead_suit = self.lead_suit()?;
        let governing = match trump {
            Some(trump) if self.plays.iter().any(|play| play.card.suit == trump) => trump,
            _ => lead_suit,
        };
        self.plays
            .iter()
            .filter(|play| play.card.suit == governing)
            .max_by_key(|play| play.card.rank)
            .copied()
    }

    fn expected_position(&self) -> PlayerPosition {
        self.plays
            .last()
            .map(|play| play.position.next())
            .unwrap_or(self.leader)
    }
}
