use crate::model::card::Card;
use crate::model::deck::{Deck, HAND_SIZE};
use crate::model::hand::Hand;
use crate::model::player::PlayerPosition;
use crate::model::trick::{Trick, TrickError};
use crate::model::variant::RoundContext;
use crate::rules::{KingRules, TrickRules};
use std::{array, fmt};

/// A single King round: four hands, the trick in progress and the finished tricks.
#[derive(Debug, Clone)]
pub struct RoundState {
    hands: [Hand; 4],
    current_trick: Trick,
    trick_history: Vec<Trick>,
    starting_player: PlayerPosition,
    context: RoundContext,
}

impl RoundState {
    pub fn deal(deck: &Deck, starting_player: PlayerPosition, context: RoundContext) -> Self {
        let mut hands: [Hand; 4] = array::from_fn(|_| Hand::new());
        for (index, card) in deck.cards().iter().enumerate() {
            hands[index % 4].add(*card);
        }
        Self::from_hands(hands, starting_player, context)
    }

    pub fn from_hands(hands: [Hand; 4], starting_player: PlayerPosition, context: RoundContext) -> Self {
        Self {
            hands,
            current_trick: Trick::new(starting_player),
            trick_history: Vec::with_capacity(HAND_SIZE),
            starting_player,
            context,
        }
    }

    pub fn hand(&self, seat: PlayerPosition) -> &Hand {
        &self.hands[seat.index()]
    }

    pub fn context(&self) -> &RoundContext {
        &self.context
    }

    pub fn current_trick(&self) -> &Trick {
        &self.current_trick
    }

    pub fn trick_history(&self) -> &[Trick] {
        &self.trick_history
    }

    pub fn starting_player(&self) -> PlayerPosition {
        self.starting_player
    }

    pub fn tricks_completed(&self) -> usize {
        self.trick_history.len()
    }

    pub fn is_finished(&self) -> bool {
        self.trick_history.len() == HAND_SIZE
    }

    /// Seat due to play, `None` once the round is over.
    pub fn to_act(&self) -> Option<PlayerPosition> {
        if self.is_finished() {
            None
        } else {
            self.current_trick.next_to_act()
        }
    }

    pub fn legal_plays<R: TrickRules + ?Sized>(&self, rules: &R, seat: PlayerPosition) -> Vec<Card> {
        rules.legal_plays(self.hand(seat).cards(), &self.current_trick, &self.context)
    }

    pub fn play_card(&mut self, seat: PlayerPosition, card: Card) -> Result<PlayOutcome, PlayError> {
        self.play_card_with(&KingRules, seat, card)
    }

    pub fn play_card_with<R: TrickRules + ?Sized>(
        &mut self,
        rules: &R,
        seat: PlayerPosition,
        card: Card,
    ) -> Result<PlayOutcome, PlayError> {
        if self.is_finished() {
            return Err(PlayError::RoundFinished);
        }

        if !self.hands[seat.index()].contains(card) {
            return Err(PlayError::CardNotInHand(card));
        }

        let expected = self.current_trick.next_to_act().unwrap_or(self.current_trick.leader());
        if expected != seat {
            return Err(PlayError::OutOfTurn { expected, actual: seat });
        }

        if !self.legal_plays(rules, seat).contains(&card) {
            return Err(PlayError::IllegalPlay(card));
        }

        self.current_trick.play(seat, card).map_err(PlayError::Trick)?;
        self.hands[seat.index()].remove(card);

        if !self.current_trick.is_complete() {
            return Ok(PlayOutcome::Played);
        }

        let index = self.trick_history.len();
        let winner = rules
            .resolve_trick(&self.current_trick, &self.context)
            .ok_or(PlayError::Trick(TrickError::TrickComplete))?;
        let points = rules.trick_points(&self.current_trick, index, &self.context);
        self.context.record_points(points);
        let finished = std::mem::replace(&mut self.current_trick, Trick::new(winner));
        self.trick_history.push(finished);
        Ok(PlayOutcome::TrickCompleted { winner, points })
    }

    /// Final round score per seat, including any base points of the variant.
    pub fn final_scores<R: TrickRules + ?Sized>(&self, rules: &R) -> [i32; 4] {
        rules.score_round(&self.trick_history, &self.context)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played,
    TrickCompleted { winner: PlayerPosition, points: [i32; 4] },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    RoundFinished,
    CardNotInHand(Card),
    OutOfTurn { expected: PlayerPosition, actual: PlayerPosition },
    IllegalPlay(Card),
    Trick(TrickError),
}

impl fmt::Display for PlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayError::RoundFinished => write!(f, "round already finished"),
            PlayError::CardNotInHand(card) => write!(f, "{card} is not in hand"),
            PlayError::OutOfTurn { expected, actual } => {
                write!(f, "expected {expected} to play next but got {actual}")
            }
            PlayError::IllegalPlay(card) => write!(f, "{card} is not a legal play"),
            PlayError::Trick(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PlayError {}
