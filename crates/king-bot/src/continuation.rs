//! Anchors a sampled deal to the real trick in progress.

use king_core::belief::SampledDeal;
use king_core::model::card::Card;
use king_core::model::card_set::CardSet;
use king_core::model::player::PlayerPosition;
use king_core::model::trick::{Trick, TrickError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContinuationError {
    #[error("{0} was already played and cannot be offered again")]
    CardReplayed(Card),
    #[error("{seat} does not hold {card} in this deal")]
    NotHeld { seat: PlayerPosition, card: Card },
    #[error("deal gives {seat} {actual} cards, expected {expected}")]
    HandSizeMismatch {
        seat: PlayerPosition,
        expected: usize,
        actual: usize,
    },
    #[error("no trick to start: every hand is empty")]
    RoundOver,
    #[error(transparent)]
    Trick(#[from] TrickError),
}

/// Simulation-ready state: the trick in progress plus every seat's remaining cards.
///
/// Cards already in the trick stay there, and every card that leaves a hand is logged,
/// so nothing can be played twice.
#[derive(Debug, Clone)]
pub struct TrickContinuation {
    perspective: PlayerPosition,
    trick: Trick,
    hands: [CardSet; 4],
    played: CardSet,
}

impl TrickContinuation {
    /// Resumes `trick` (zero to three plays) with the hands of `deal`.
    pub fn resume(trick: &Trick, perspective: PlayerPosition, deal: &SampledDeal) -> Result<Self, ContinuationError> {
        let played = trick.cards();
        for seat in PlayerPosition::LOOP {
            if let Some(card) = deal.hand(seat).intersection(played).iter().next() {
                return Err(ContinuationError::CardReplayed(card));
            }
        }

        // Seats that already played this trick hold one card fewer than those still to act.
        let to_act = trick.remaining_actors();
        let expected = to_act
            .first()
            .map(|&seat| deal.hand(seat).len())
            .unwrap_or_else(|| deal.hand(trick.leader()).len());
        for seat in PlayerPosition::LOOP {
            let want = if to_act.is_empty() || to_act.contains(&seat) {
                expected
            } else {
                expected.saturating_sub(1)
            };
            let actual = deal.hand(seat).len();
            if actual != want {
                return Err(ContinuationError::HandSizeMismatch {
                    seat,
                    expected: want,
                    actual,
                });
            }
        }

        Ok(Self {
            perspective,
            trick: trick.clone(),
            hands: *deal.hands(),
            played,
        })
    }

    /// Starts a fresh trick led by `leader`.
    pub fn fresh(leader: PlayerPosition, perspective: PlayerPosition, deal: &SampledDeal) -> Result<Self, ContinuationError> {
        Self::resume(&Trick::new(leader), perspective, deal)
    }

    pub fn perspective(&self) -> PlayerPosition {
        self.perspective
    }

    pub fn trick(&self) -> &Trick {
        &self.trick
    }

    pub fn hand(&self, seat: PlayerPosition) -> CardSet {
        self.hands[seat.index()]
    }

    pub fn played(&self) -> CardSet {
        self.played
    }

    pub fn next_to_act(&self) -> Option<PlayerPosition> {
        self.trick.next_to_act()
    }

    /// Seats still to act in the current trick, in seating order.
    pub fn remaining_actors(&self) -> Vec<PlayerPosition> {
        self.trick.remaining_actors()
    }

    pub fn is_exhausted(&self) -> bool {
        self.hands.iter().all(|hand| hand.is_empty())
    }

    pub fn play(&mut self, seat: PlayerPosition, card: Card) -> Result<(), ContinuationError> {
        if self.played.contains(card) {
            return Err(ContinuationError::CardReplayed(card));
        }
        if !self.hands[seat.index()].contains(card) {
            return Err(ContinuationError::NotHeld { seat, card });
        }
        self.trick.play(seat, card)?;
        self.hands[seat.index()].remove(card);
        self.played.insert(card);
        Ok(())
    }

    /// Replaces the completed trick with an empty one led by `winner`, returning it.
    pub fn start_next(&mut self, winner: PlayerPosition) -> Result<Trick, ContinuationError> {
        if self.is_exhausted() {
            return Err(ContinuationError::RoundOver);
        }
        Ok(std::mem::replace(&mut self.trick, Trick::new(winner)))
    }
}
