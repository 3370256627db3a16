//! Hard knowledge about hidden hands, maintained from observed play.

use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::deck::HAND_SIZE;
use crate::model::player::PlayerPosition;
use crate::model::suit::Suit;
use crate::model::trick::Trick;
use crate::model::variant::{RoundContext, RoundVariant};
use std::fmt;
use tracing::{error, trace};

/// A fact excluding a class of cards from one player's hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Void(Suit),
    /// Holds no jack or king.
    NoMen,
    /// Holds no queen.
    NoQueens,
}

impl ConstraintKind {
    pub fn excludes(self, card: Card) -> bool {
        match self {
            ConstraintKind::Void(suit) => card.suit == suit,
            ConstraintKind::NoMen => card.is_man(),
            ConstraintKind::NoQueens => card.is_woman(),
        }
    }

    pub fn excluded_cards(self) -> CardSet {
        CardSet::matching(|card| self.excludes(card))
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Void(suit) => write!(f, "void in {suit}"),
            ConstraintKind::NoMen => write!(f, "no jacks or kings"),
            ConstraintKind::NoQueens => write!(f, "no queens"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub player: PlayerPosition,
    pub kind: ConstraintKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    VoidContradiction {
        player: PlayerPosition,
        card: Card,
        constraint: ConstraintKind,
    },
    CardAlreadySeen(Card),
    NotInOwnHand(Card),
    HandExhausted(PlayerPosition),
    DeckSizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingError::VoidContradiction {
                player,
                card,
                constraint,
            } => write!(f, "{player} played {card} but is known to hold {constraint}"),
            TrackingError::CardAlreadySeen(card) => write!(f, "{card} was already accounted for"),
            TrackingError::NotInOwnHand(card) => write!(f, "{card} is not in the tracked hand"),
            TrackingError::HandExhausted(player) => write!(f, "{player} has no cards left"),
            TrackingError::DeckSizeMismatch { expected, actual } => {
                write!(f, "hand sizes and discards add up to {actual}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for TrackingError {}

/// Per-round knowledge held by one seat about everybody else's hands.
#[derive(Debug, Clone)]
pub struct CardKnowledgeTracker {
    perspective: PlayerPosition,
    context: RoundContext,
    own_hand: CardSet,
    unseen: CardSet,
    discarded: CardSet,
    hand_sizes: [u8; 4],
    constraints: Vec<Constraint>,
    exclusions: [CardSet; 4],
    current: Vec<(PlayerPosition, Card)>,
    tricks_completed: usize,
}

impl CardKnowledgeTracker {
    pub fn new(perspective: PlayerPosition, own_hand: &[Card], ctx: &RoundContext) -> Self {
        let own = CardSet::from_cards(own_hand.iter().copied());
        Self {
            perspective,
            context: ctx.clone(),
            own_hand: own,
            unseen: CardSet::FULL.difference(own),
            discarded: CardSet::EMPTY,
            hand_sizes: [HAND_SIZE as u8; 4],
            constraints: Vec::new(),
            exclusions: [CardSet::EMPTY; 4],
            current: Vec::with_capacity(4),
            tricks_completed: 0,
        }
    }

    pub fn reset_for_new_round(&mut self, perspective: PlayerPosition, own_hand: &[Card], ctx: &RoundContext) {
        *self = Self::new(perspective, own_hand, ctx);
    }

    pub fn perspective(&self) -> PlayerPosition {
        self.perspective
    }

    pub fn context(&self) -> &RoundContext {
        &self.context
    }

    /// Records that `player` played `card`. On error the tracker is left untouched.
    pub fn observe(&mut self, player: PlayerPosition, card: Card) -> Result<(), TrackingError> {
        let mut next = self.clone();
        if let Err(err) = next.apply(player, card) {
            error!(target: "king_core::belief", %player, %card, error = %err, "tracking contradiction");
            return Err(err);
        }
        *self = next;
        Ok(())
    }

    fn apply(&mut self, player: PlayerPosition, card: Card) -> Result<(), TrackingError> {
        if self.discarded.contains(card) {
            return Err(TrackingError::CardAlreadySeen(card));
        }
        if self.hand_sizes[player.index()] == 0 {
            return Err(TrackingError::HandExhausted(player));
        }

        if player == self.perspective {
            if !self.own_hand.remove(card) {
                return Err(TrackingError::NotInOwnHand(card));
            }
        } else {
            if self.own_hand.contains(card) {
                return Err(TrackingError::CardAlreadySeen(card));
            }
            if let Some(constraint) = self
                .constraints
                .iter()
                .find(|c| c.player == player && c.kind.excludes(card))
            {
                return Err(TrackingError::VoidContradiction {
                    player,
                    card,
                    constraint: constraint.kind,
                });
            }
            self.unseen.remove(card);
        }

        let lead = self.current.first().map(|&(_, lead)| lead.suit);
        self.discarded.insert(card);
        self.hand_sizes[player.index()] -= 1;
        self.current.push((player, card));

        if let Some(required) = lead {
            if card.suit != required && player != self.perspective {
                self.add_constraint(player, ConstraintKind::Void(required));
                if let Some(kind) = self.broken_obligation(card) {
                    self.add_constraint(player, kind);
                }
            }
        }

        if self.current.len() == 4 {
            self.current.clear();
            self.tricks_completed += 1;
        }

        self.check_deck_size()
    }

    /// Constraint implied by a void follower discarding something other than the
    /// obliged penalty card.
    fn broken_obligation(&self, card: Card) -> Option<ConstraintKind> {
        match self.context.variant() {
            RoundVariant::Copas if !card.suit.is_heart() => Some(ConstraintKind::Void(Suit::Hearts)),
            RoundVariant::Homens if !card.is_man() => Some(ConstraintKind::NoMen),
            RoundVariant::Mulheres if !card.is_woman() => Some(ConstraintKind::NoQueens),
            _ => None,
        }
    }

    fn add_constraint(&mut self, player: PlayerPosition, kind: ConstraintKind) {
        let constraint = Constraint { player, kind };
        if self.constraints.contains(&constraint) {
            return;
        }
        trace!(target: "king_core::belief", %player, %kind, "constraint inferred");
        self.exclusions[player.index()] = self.exclusions[player.index()].union(kind.excluded_cards());
        self.constraints.push(constraint);
    }

    fn check_deck_size(&self) -> Result<(), TrackingError> {
        let expected = self.context.deck_size();
        let actual = self.hand_sizes.iter().map(|&n| n as usize).sum::<usize>() + self.discarded.len();
        if actual != expected {
            return Err(TrackingError::DeckSizeMismatch { expected, actual });
        }
        Ok(())
    }

    /// Cards `player` might still hold. For the perspective seat this is its own hand.
    pub fn unseen_for(&self, player: PlayerPosition) -> Vec<Card> {
        if player == self.perspective {
            return self.own_hand.to_vec();
        }
        self.unseen.difference(self.exclusions[player.index()]).to_vec()
    }

    pub fn hand_size(&self, player: PlayerPosition) -> usize {
        self.hand_sizes[player.index()] as usize
    }

    pub fn own_hand(&self) -> Vec<Card> {
        self.own_hand.to_vec()
    }

    /// Constraints in the order they were inferred.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn has_void(&self, player: PlayerPosition, suit: Suit) -> bool {
        self.constraints
            .iter()
            .any(|c| c.player == player && c.kind == ConstraintKind::Void(suit))
    }

    pub fn discarded_count(&self) -> usize {
        self.discarded.len()
    }

    pub fn cards_played(&self) -> usize {
        self.discarded.len()
    }

    pub fn tricks_completed(&self) -> usize {
        self.tricks_completed
    }

    pub fn current_trick(&self) -> Option<Trick> {
        let &(leader, _) = self.current.first()?;
        Trick::from_plays(leader, &self.current).ok()
    }

    pub fn snapshot(&self) -> KnowledgeSnapshot {
        KnowledgeSnapshot {
            perspective: self.perspective,
            own_hand: self.own_hand,
            unseen: self.unseen,
            discarded: self.discarded,
            hand_sizes: self.hand_sizes,
            constraints: self.constraints.clone(),
        }
    }
}

/// Read-only copy of a tracker's knowledge, used for the whole of one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeSnapshot {
    perspective: PlayerPosition,
    own_hand: CardSet,
    unseen: CardSet,
    discarded: CardSet,
    hand_sizes: [u8; 4],
    constraints: Vec<Constraint>,
}

impl KnowledgeSnapshot {
    /// Builds a snapshot directly, mainly for tests and solvers that know the full state.
    pub fn from_parts(
        perspective: PlayerPosition,
        own_hand: CardSet,
        unseen: CardSet,
        hand_sizes: [u8; 4],
        constraints: Vec<Constraint>,
    ) -> Self {
        let discarded = CardSet::FULL.difference(own_hand).difference(unseen);
        Self {
            perspective,
            own_hand,
            unseen,
            discarded,
            hand_sizes,
            constraints,
        }
    }

    pub fn perspective(&self) -> PlayerPosition {
        self.perspective
    }

    pub fn own_hand(&self) -> CardSet {
        self.own_hand
    }

    pub fn unseen(&self) -> CardSet {
        self.unseen
    }

    pub fn discarded(&self) -> CardSet {
        self.discarded
    }

    pub fn hand_size(&self, player: PlayerPosition) -> usize {
        self.hand_sizes[player.index()] as usize
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn exclusions(&self, player: PlayerPosition) -> CardSet {
        self.constraints
            .iter()
            .filter(|c| c.player == player)
            .fold(CardSet::EMPTY, |acc, c| acc.union(c.kind.excluded_cards()))
    }

    pub fn candidates_for(&self, player: PlayerPosition) -> CardSet {
        if player == self.perspective {
            self.own_hand
        } else {
            self.unseen.difference(self.exclusions(player))
        }
    }

    /// Copy with the least recently inferred constraint dropped.
    pub fn without_oldest_constraint(&self) -> Option<Self> {
        if self.constraints.is_empty() {
            return None;
        }
        let mut relaxed = self.clone();
        relaxed.constraints.remove(0);
        Some(relaxed)
    }
}
