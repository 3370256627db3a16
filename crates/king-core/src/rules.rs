//! Trick resolution, legal plays and scoring for every King round variant.

use crate::model::card::Card;
use crate::model::player::PlayerPosition;
use crate::model::trick::Trick;
use crate::model::variant::{FestaMode, RoundContext, RoundVariant};

pub const TRICKS_PER_ROUND: usize = 13;

pub const VAZAS_POINTS_PER_TRICK: i32 = -20;
pub const COPAS_POINTS_PER_HEART: i32 = -20;
pub const HOMENS_POINTS_PER_MAN: i32 = -30;
pub const MULHERES_POINTS_PER_QUEEN: i32 = -50;
pub const KING_OF_HEARTS_POINTS: i32 = -160;
pub const LAST_TRICK_POINTS: i32 = -90;
pub const NULOS_BASE_POINTS: i32 = 325;
pub const NULOS_POINTS_PER_TRICK: i32 = -75;
pub const POSITIVOS_POINTS_PER_TRICK: i32 = 25;

/// Rules consumed by the decision engine. Every simulated rollout applies the same
/// implementation as real play.
pub trait TrickRules: Send + Sync {
    /// Cards from `hand` that may be played into `trick`, in hand order.
    fn legal_plays(&self, hand: &[Card], trick: &Trick, ctx: &RoundContext) -> Vec<Card>;

    /// Winner of a complete trick. Returns `None` for an empty trick.
    fn resolve_trick(&self, trick: &Trick, ctx: &RoundContext) -> Option<PlayerPosition>;

    /// Points earned by each seat for trick number `index` (0-based).
    fn trick_points(&self, trick: &Trick, index: usize, ctx: &RoundContext) -> [i32; 4];

    fn score_round(&self, tricks: &[Trick], ctx: &RoundContext) -> [i32; 4] {
        let mut totals = self.round_base(ctx);
        for (index, trick) in tricks.iter().enumerate() {
            for (total, points) in totals.iter_mut().zip(self.trick_points(trick, index, ctx)) {
                *total += points;
            }
        }
        totals
    }

    /// Points every seat starts the round with.
    fn round_base(&self, _ctx: &RoundContext) -> [i32; 4] {
        [0; 4]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KingRules;

impl KingRules {
    /// Cards a void follower must discard first when holding any, for the current variant.
    fn discard_obligation(card: Card, ctx: &RoundContext) -> Option<bool> {
        match ctx.variant() {
            RoundVariant::Copas => Some(card.suit.is_heart()),
            RoundVariant::Homens => Some(card.is_man()),
            RoundVariant::Mulheres => Some(card.is_woman()),
            _ => None,
        }
    }

    /// Value of the cards captured in `trick` for the winner.
    pub fn capture_value(trick: &Trick, index: usize, ctx: &RoundContext) -> i32 {
        let cards = trick.plays().iter().map(|play| play.card);
        match ctx.variant() {
            RoundVariant::Vazas => VAZAS_POINTS_PER_TRICK,
            RoundVariant::Copas => {
                cards.filter(|card| card.suit.is_heart()).count() as i32 * COPAS_POINTS_PER_HEART
            }
            RoundVariant::Homens => {
                cards.filter(|card| card.is_man()).count() as i32 * HOMENS_POINTS_PER_MAN
            }
            RoundVariant::Mulheres => {
                cards.filter(|card| card.is_woman()).count() as i32 * MULHERES_POINTS_PER_QUEEN
            }
            RoundVariant::King => {
                if cards.into_iter().any(Card::is_king_of_hearts) {
                    KING_OF_HEARTS_POINTS
                } else {
                    0
                }
            }
            RoundVariant::Last => {
                if index + 2 >= TRICKS_PER_ROUND {
                    LAST_TRICK_POINTS
                } else {
                    0
                }
            }
            RoundVariant::Festa => match ctx.festa_mode() {
                Some(FestaMode::Positivos { .. }) => POSITIVOS_POINTS_PER_TRICK,
                _ => NULOS_POINTS_PER_TRICK,
            },
        }
    }
}

impl TrickRules for KingRules {
    fn legal_plays(&self, hand: &[Card], trick: &Trick, ctx: &RoundContext) -> Vec<Card> {
        let mut legal: Vec<Card> = match trick.lead_suit() {
            None => hand.to_vec(),
            Some(lead) if hand.iter().any(|card| card.suit == lead) => {
                hand.iter().copied().filter(|card| card.suit == lead).collect()
            }
            Some(_) => {
                let obliged: Vec<Card> = hand
                    .iter()
                    .copied()
                    .filter(|&card| Self::discard_obligation(card, ctx) == Some(true))
                    .collect();
                if obliged.is_empty() {
                    hand.to_vec()
                } else {
                    obliged
                }
            }
        };
        legal.sort_by(|a, b| a.suit.cmp(&b.suit).then(a.rank.cmp(&b.rank)));
        legal
    }

    fn resolve_trick(&self, trick: &Trick, ctx: &RoundContext) -> Option<PlayerPosition> {
        trick.winning_play(ctx.trump()).map(|play| play.position)
    }

    fn trick_points(&self, trick: &Trick, index: usize, ctx: &RoundContext) -> [i32; 4] {
        let mut points = [0; 4];
        if let Some(winner) = self.resolve_trick(trick, ctx) {
            points[winner.index()] = Self::capture_value(trick, index, ctx);
        }
        points
    }

    fn round_base(&self, ctx: &RoundContext) -> [i32; 4] {
        match ctx.festa_mode() {
            Some(FestaMode::Nulos) => [NULOS_BASE_POINTS; 4],
            _ => [0; 4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{KingRules, TrickRules};
    use crate::model::card::Card;
    use crate::model::player::PlayerPosition;
    use crate::model::suit::Suit;
    use crate::model::trick::Trick;
    use crate::model::variant::{FestaMode, RoundContext, RoundVariant};

    fn cards(text: &[&str]) -> Vec<Card> {
        text.iter().map(|t| t.parse().unwrap()).collect()
    }

    fn trick(leader: PlayerPosition, text: &[&str]) -> Trick {
        let mut trick = Trick::new(leader);
        let mut seat = leader;
        for card in cards(text) {
            trick.play(seat, card).unwrap();
            seat = seat.next();
        }
        trick
    }

    #[test]
    fn leader_may_play_anything() {
        let rules = KingRules;
        let hand = cards(&["2C", "KH", "5S"]);
        let ctx = RoundContext::new(RoundVariant::Copas);
        let legal = rules.legal_plays(&hand, &Trick::new(PlayerPosition::North), &ctx);
        assert_eq!(legal, cards(&["2C", "5S", "KH"]));
    }

    #[test]
    fn followers_must_follow_suit() {
        let rules = KingRules;
        let hand = cards(&["2S", "KS", "QH"]);
        let ctx = RoundContext::new(RoundVariant::Mulheres);
        let current = trick(PlayerPosition::North, &["9S"]);
        assert_eq!(rules.legal_plays(&hand, &current, &ctx), cards(&["2S", "KS"]));
    }

    #[test]
    fn void_followers_must_discard_penalty_cards_when_held() {
        let rules = KingRules;
        let current = trick(PlayerPosition::North, &["9D"]);
        let hand = cards(&["2S", "JC", "QH", "4H"]);

        let copas = RoundContext::new(RoundVariant::Copas);
        assert_eq!(rules.legal_plays(&hand, &current, &copas), cards(&["4H", "QH"]));

        let homens = RoundContext::new(RoundVariant::Homens);
        assert_eq!(rules.legal_plays(&hand, &current, &homens), cards(&["JC"]));

        let mulheres = RoundContext::new(RoundVariant::Mulheres);
        assert_eq!(rules.legal_plays(&hand, &current, &mulheres), cards(&["QH"]));

        let vazas = RoundContext::new(RoundVariant::Vazas);
        assert_eq!(rules.legal_plays(&hand, &current, &vazas).len(), 4);
    }

    #[test]
    fn trump_takes_precedence_in_positivos() {
        let rules = KingRules;
        let done = trick(PlayerPosition::West, &["AC", "3H", "KC", "2H"]);
        let plain = RoundContext::new(RoundVariant::Vazas);
        assert_eq!(rules.resolve_trick(&done, &plain), Some(PlayerPosition::West));

        let trump = RoundContext::festa(FestaMode::Positivos { trump: Suit::Hearts });
        assert_eq!(rules.resolve_trick(&done, &trump), Some(PlayerPosition::North));
        assert_eq!(rules.trick_points(&done, 0, &trump), [25, 0, 0, 0]);
    }

    #[test]
    fn trick_points_follow_variant_table() {
        let rules = KingRules;
        let done = trick(PlayerPosition::North, &["KH", "QH", "JH", "2H"]);
        let expect = |variant: RoundVariant, index: usize| {
            rules.trick_points(&done, index, &RoundContext::new(variant))[0]
        };
        assert_eq!(expect(RoundVariant::Vazas, 0), -20);
        assert_eq!(expect(RoundVariant::Copas, 0), -80);
        assert_eq!(expect(RoundVariant::Homens, 0), -60);
        assert_eq!(expect(RoundVariant::Mulheres, 0), -50);
        assert_eq!(expect(RoundVariant::King, 0), -160);
        assert_eq!(expect(RoundVariant::Last, 10), 0);
        assert_eq!(expect(RoundVariant::Last, 11), -90);
        assert_eq!(expect(RoundVariant::Last, 12), -90);
        assert_eq!(expect(RoundVariant::Festa, 0), -75);
    }

    #[test]
    fn nulos_round_starts_from_base() {
        let rules = KingRules;
        let ctx = RoundContext::festa(FestaMode::Nulos);
        let done = trick(PlayerPosition::East, &["2C", "3C", "4C", "5C"]);
        let totals = rules.score_round(&[done], &ctx);
        assert_eq!(totals, [325 - 75, 325, 325, 325]);
    }
}
