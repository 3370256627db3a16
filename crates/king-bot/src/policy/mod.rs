mod heuristic;

pub use heuristic::HeuristicPolicy;

use king_core::model::card::Card;
use king_core::model::player::PlayerPosition;
use king_core::model::trick::Trick;
use king_core::model::variant::RoundContext;
use tracing::{Level, event};

/// What a seat may legitimately look at when choosing a card.
#[derive(Debug, Clone, Copy)]
pub struct PublicView<'a> {
    pub seat: PlayerPosition,
    pub hand: &'a [Card],
    pub trick: &'a Trick,
    pub context: &'a RoundContext,
    pub tricks_completed: usize,
}

/// Opaque move oracle driving every seat inside a rollout.
///
/// Implementations must return a member of `legal`; the simulation guards the
/// contract and substitutes the first legal card otherwise.
pub trait RolloutPolicy: Send + Sync {
    fn choose(&self, legal: &[Card], view: &PublicView<'_>) -> Card;
}

impl<F> RolloutPolicy for F
where
    F: Fn(&[Card], &PublicView<'_>) -> Card + Send + Sync,
{
    fn choose(&self, legal: &[Card], view: &PublicView<'_>) -> Card {
        self(legal, view)
    }
}

/// Always plays the lowest legal card (rank first, then suit order).
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestCardPolicy;

impl RolloutPolicy for LowestCardPolicy {
    fn choose(&self, legal: &[Card], _view: &PublicView<'_>) -> Card {
        lowest(legal).unwrap_or_else(|| legal[0])
    }
}

pub(crate) fn lowest(cards: &[Card]) -> Option<Card> {
    cards.iter().copied().min_by_key(|card| card.tie_break_key())
}

pub(crate) fn highest(cards: &[Card]) -> Option<Card> {
    cards.iter().copied().max_by_key(|card| card.tie_break_key())
}

/// Asks `policy` for a card and falls back to the first legal card when the answer
/// is not one of `legal`. `legal` must not be empty.
pub fn guarded_choice(policy: &dyn RolloutPolicy, legal: &[Card], view: &PublicView<'_>) -> Card {
    let card = policy.choose(legal, view);
    if legal.contains(&card) {
        return card;
    }
    event!(
        target: "king_bot::policy",
        Level::WARN,
        seat = %view.seat,
        returned = %card,
        legal_count = legal.len(),
        "rollout policy returned an illegal card"
    );
    legal[0]
}
