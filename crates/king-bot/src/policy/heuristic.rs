use super::{PublicView, RolloutPolicy, highest, lowest};
use king_core::model::card::Card;
use king_core::model::suit::Suit;
use king_core::model::trick::Play;
use king_core::model::variant::{FestaMode, RoundVariant};

/// Single-ply King heuristic: dodge whatever the current variant penalizes, or chase
/// tricks in positivos Festa.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPolicy;

impl HeuristicPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl RolloutPolicy for HeuristicPolicy {
    fn choose(&self, legal: &[Card], view: &PublicView<'_>) -> Card {
        if legal.len() == 1 {
            return legal[0];
        }
        let choice = match view.context.variant() {
            RoundVariant::Vazas | RoundVariant::Last => duck_under(legal, view),
            RoundVariant::Copas => avoid(legal, |card| card.suit.is_heart()),
            RoundVariant::Homens => avoid(legal, Card::is_man),
            RoundVariant::Mulheres => avoid(legal, Card::is_woman),
            RoundVariant::King => avoid(legal, Card::is_king_of_hearts),
            RoundVariant::Festa => match view.context.festa_mode() {
                Some(FestaMode::Positivos { trump }) => take_trick(legal, view, trump),
                _ => duck_under(legal, view),
            },
        };
        choice.unwrap_or(legal[0])
    }
}

/// Lowest card outside the penalized class, else the lowest card.
fn avoid<F: Fn(Card) -> bool>(legal: &[Card], penalized: F) -> Option<Card> {
    let safe: Vec<Card> = legal.iter().copied().filter(|&card| !penalized(card)).collect();
    lowest(&safe).or_else(|| lowest(legal))
}

/// Highest card of the required suit that stays under the current top card, else the
/// lowest card. Leading plays the lowest card.
fn duck_under(legal: &[Card], view: &PublicView<'_>) -> Option<Card> {
    let Some(lead) = view.trick.lead_suit() else {
        return lowest(legal);
    };
    let top = view
        .trick
        .plays()
        .iter()
        .filter(|play| play.card.suit == lead)
        .map(|play| play.card.rank)
        .max()?;
    let safe: Vec<Card> = legal
        .iter()
        .copied()
        .filter(|card| card.suit == lead && card.rank < top)
        .collect();
    highest(&safe).or_else(|| lowest(legal))
}

/// Leads the highest card. Following, plays a winning card (the highest while others
/// are still to act, the cheapest when last), else the lowest card.
fn take_trick(legal: &[Card], view: &PublicView<'_>, trump: Suit) -> Option<Card> {
    let Some(current) = view.trick.winning_play(Some(trump)) else {
        return highest(legal);
    };
    let winners: Vec<Card> = legal
        .iter()
        .copied()
        .filter(|&card| beats(card, current, trump))
        .collect();
    let acting_last = view.trick.len() == 3;
    let pick = if acting_last { lowest(&winners) } else { highest(&winners) };
    pick.or_else(|| lowest(legal))
}

fn beats(card: Card, current: Play, trump: Suit) -> bool {
    if card.suit == current.card.suit {
        card.rank > current.card.rank
    } else {
        card.suit == trump
    }
}
