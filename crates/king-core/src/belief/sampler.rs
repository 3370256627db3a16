//! Uniform sampling of complete deals consistent with a [`KnowledgeSnapshot`].
//!
//! Unseen cards are grouped by the set of opponents allowed to hold them. The number of
//! consistent completions is counted exactly over (group, remaining capacities), and each
//! group's split is drawn in proportion to the completions it leaves, so every
//! consistent deal is equally likely and no draw can reach a dead end.

use super::tracker::KnowledgeSnapshot;
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::player::PlayerPosition;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt;

/// One complete assignment of every unplayed card to a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledDeal {
    hands: [CardSet; 4],
}

impl SampledDeal {
    pub fn from_hands(hands: [CardSet; 4]) -> Self {
        Self { hands }
    }

    pub fn hand(&self, seat: PlayerPosition) -> CardSet {
        self.hands[seat.index()]
    }

    pub fn hands(&self) -> &[CardSet; 4] {
        &self.hands
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Infeasibility {
    /// Unseen cards do not match the opponents' combined hand sizes.
    SizeMismatch { unseen: usize, capacity: usize },
    /// Every opponent is excluded from holding this card.
    NoEligibleHolder(Card),
    /// More cards are confined to these seats than they have room for.
    Overloaded {
        seats: Vec<PlayerPosition>,
        cards: usize,
        capacity: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    Infeasible(Infeasibility),
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingError::Infeasible(Infeasibility::SizeMismatch { unseen, capacity }) => write!(
                f,
                "{unseen} unseen cards cannot fill {capacity} open slots"
            ),
            SamplingError::Infeasible(Infeasibility::NoEligibleHolder(card)) => {
                write!(f, "no opponent may hold {card}")
            }
            SamplingError::Infeasible(Infeasibility::Overloaded {
                seats,
                cards,
                capacity,
            }) => write!(
                f,
                "{cards} cards confined to {seats:?} exceed their {capacity} open slots"
            ),
        }
    }
}

impl std::error::Error for SamplingError {}

/// Cards sharing the same set of eligible opponents.
#[derive(Debug, Clone)]
struct EligibilityGroup {
    /// Bit `i` set when `opponents[i]` may hold these cards.
    mask: u8,
    cards: Vec<Card>,
}

type Capacities = [u8; 3];

#[derive(Debug, Clone)]
pub struct HandSampler {
    perspective: PlayerPosition,
    own_hand: CardSet,
    opponents: [PlayerPosition; 3],
    capacities: Capacities,
    groups: Vec<EligibilityGroup>,
    completions: HashMap<(usize, Capacities), u128>,
    relaxed: usize,
}

impl HandSampler {
    pub fn new(snapshot: &KnowledgeSnapshot) -> Result<Self, SamplingError> {
        let perspective = snapshot.perspective();
        let opponents = perspective.others();
        let capacities: Capacities = opponents.map(|seat| snapshot.hand_size(seat) as u8);
        let capacity: usize = capacities.iter().map(|&c| c as usize).sum();
        let unseen = snapshot.unseen();

        if unseen.len() != capacity {
            return Err(SamplingError::Infeasible(Infeasibility::SizeMismatch {
                unseen: unseen.len(),
                capacity,
            }));
        }

        let candidates = opponents.map(|seat| snapshot.candidates_for(seat));
        let mut by_mask: [Vec<Card>; 8] = Default::default();
        for card in unseen.iter() {
            let mask = (0..3)
                .filter(|&slot| candidates[slot].contains(card))
                .fold(0u8, |acc, slot| acc | (1 << slot));
            if mask == 0 {
                return Err(SamplingError::Infeasible(Infeasibility::NoEligibleHolder(card)));
            }
            by_mask[mask as usize].push(card);
        }

        check_hall_condition(&by_mask, &capacities, &opponents)?;

        let mut groups: Vec<EligibilityGroup> = by_mask
            .into_iter()
            .enumerate()
            .filter(|(_, cards)| !cards.is_empty())
            .map(|(mask, cards)| EligibilityGroup {
                mask: mask as u8,
                cards,
            })
            .collect();
        groups.sort_by_key(|group| (group.mask.count_ones(), group.mask));

        let mut sampler = Self {
            perspective,
            own_hand: snapshot.own_hand(),
            opponents,
            capacities,
            groups,
            completions: HashMap::new(),
            relaxed: 0,
        };
        let total = sampler.fill_completions(0, capacities);
        if total == 0 {
            return Err(SamplingError::Infeasible(Infeasibility::Overloaded {
                seats: opponents.to_vec(),
                cards: unseen.len(),
                capacity,
            }));
        }
        Ok(sampler)
    }

    /// Builds a sampler, dropping the oldest constraint once when the snapshot is
    /// infeasible as given.
    pub fn with_relaxation(snapshot: &KnowledgeSnapshot) -> Result<Self, SamplingError> {
        match Self::new(snapshot) {
            Ok(sampler) => Ok(sampler),
            Err(err) => {
                let relaxed = snapshot.without_oldest_constraint().ok_or(err.clone())?;
                tracing::warn!(
                    target: "king_core::belief",
                    error = %err,
                    dropped = ?snapshot.constraints().first(),
                    "relaxing oldest constraint"
                );
                let mut sampler = Self::new(&relaxed)?;
                sampler.relaxed = 1;
                Ok(sampler)
            }
        }
    }

    /// Number of constraints dropped to make the snapshot feasible.
    pub fn relaxed_constraints(&self) -> usize {
        self.relaxed
    }

    /// Exact number of consistent deals.
    pub fn count_deals(&self) -> u128 {
        self.completions
            .get(&(0, self.capacities))
            .copied()
            .unwrap_or(0)
    }

    /// Draws one deal uniformly among all consistent deals.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SampledDeal {
        let mut hands = [CardSet::EMPTY; 4];
        hands[self.perspective.index()] = self.own_hand;
        let mut caps = self.capacities;

        for (index, group) in self.groups.iter().enumerate() {
            let total = self.completions_at(index, caps);
            let mut pick = rng.gen_range(0..total);
            let mut chosen = None;
            for split in splits(group.cards.len() as u8, group.mask, caps) {
                let weight =
                    multinomial(group.cards.len() as u8, &split) * self.completions_at(index + 1, sub(caps, split));
                if pick < weight {
                    chosen = Some(split);
                    break;
                }
                pick -= weight;
            }
            // Weights sum to `total`, so a split is always chosen.
            let split = chosen.unwrap_or([0; 3]);

            let mut cards = group.cards.clone();
            cards.shuffle(rng);
            let mut offset = 0;
            for (slot, &take) in split.iter().enumerate() {
                let seat = self.opponents[slot];
                for &card in &cards[offset..offset + take as usize] {
                    hands[seat.index()].insert(card);
                }
                offset += take as usize;
            }
            caps = sub(caps, split);
        }

        SampledDeal { hands }
    }

    /// Lists consistent deals, stopping after `limit`.
    pub fn enumerate(&self, limit: usize) -> Vec<SampledDeal> {
        let mut hands = [CardSet::EMPTY; 4];
        hands[self.perspective.index()] = self.own_hand;
        let mut out = Vec::new();
        self.enumerate_from(0, self.capacities, &mut hands, limit, &mut out);
        out
    }

    fn enumerate_from(
        &self,
        index: usize,
        caps: Capacities,
        hands: &mut [CardSet; 4],
        limit: usize,
        out: &mut Vec<SampledDeal>,
    ) {
        if out.len() >= limit {
            return;
        }
        let Some(group) = self.groups.get(index) else {
            out.push(SampledDeal { hands: *hands });
            return;
        };
        for split in splits(group.cards.len() as u8, group.mask, caps) {
            let rest = sub(caps, split);
            if self.completions_at(index + 1, rest) == 0 {
                continue;
            }
            for assignment in distribute(&group.cards, split) {
                let saved = *hands;
                for (slot, cards) in assignment.iter().enumerate() {
                    let seat = self.opponents[slot];
                    hands[seat.index()] = hands[seat.index()].union(*cards);
                }
                self.enumerate_from(index + 1, rest, hands, limit, out);
                *hands = saved;
                if out.len() >= limit {
                    return;
                }
            }
        }
    }

    fn completions_at(&self, index: usize, caps: Capacities) -> u128 {
        self.completions.get(&(index, caps)).copied().unwrap_or(0)
    }

    fn fill_completions(&mut self, index: usize, caps: Capacities) -> u128 {
        if let Some(&known) = self.completions.get(&(index, caps)) {
            return known;
        }
        let count = match self.groups.get(index) {
            None => u128::from(caps == [0; 3]),
            Some(group) => {
                let size = group.cards.len() as u8;
                let mask = group.mask;
                let mut total = 0u128;
                for split in splits(size, mask, caps) {
                    let rest = self.fill_completions(index + 1, sub(caps, split));
                    total += multinomial(size, &split) * rest;
                }
                total
            }
        };
        self.completions.insert((index, caps), count);
        count
    }
}

fn sub(caps: Capacities, split: Capacities) -> Capacities {
    [caps[0] - split[0], caps[1] - split[1], caps[2] - split[2]]
}

/// Every way to split `size` cards among the slots in `mask` without exceeding `caps`.
fn splits(size: u8, mask: u8, caps: Capacities) -> Vec<Capacities> {
    let limit = |slot: usize| if mask & (1 << slot) != 0 { caps[slot] } else { 0 };
    let mut out = Vec::new();
    for a in 0..=limit(0).min(size) {
        for b in 0..=limit(1).min(size - a) {
            let c = size - a - b;
            if c <= limit(2) {
                out.push([a, b, c]);
            }
        }
    }
    out
}

fn multinomial(size: u8, split: &Capacities) -> u128 {
    binomial(size, split[0]) * binomial(size - split[0], split[1])
}

fn binomial(n: u8, k: u8) -> u128 {
    let k = k.min(n - k) as u128;
    let n = n as u128;
    (0..k).fold(1u128, |acc, i| acc * (n - i) / (i + 1))
}

/// All ways to hand out `cards` with `split[slot]` cards per slot.
fn distribute(cards: &[Card], split: Capacities) -> Vec<[CardSet; 3]> {
    fn go(cards: &[Card], remaining: Capacities, current: [CardSet; 3], out: &mut Vec<[CardSet; 3]>) {
        let Some((&card, rest)) = cards.split_first() else {
            out.push(current);
            return;
        };
        for slot in 0..3 {
            if remaining[slot] == 0 {
                continue;
            }
            let mut next = current;
            next[slot].insert(card);
            let mut left = remaining;
            left[slot] -= 1;
            go(rest, left, next, out);
        }
    }
    let mut out = Vec::new();
    go(cards, split, [CardSet::EMPTY; 3], &mut out);
    out
}

/// Cards confined to any subset of opponents must fit in that subset's open slots.
fn check_hall_condition(
    by_mask: &[Vec<Card>; 8],
    capacities: &Capacities,
    opponents: &[PlayerPosition; 3],
) -> Result<(), SamplingError> {
    for subset in 1u8..8 {
        let confined: usize = (1u8..8)
            .filter(|mask| mask & !subset == 0)
            .map(|mask| by_mask[mask as usize].len())
            .sum();
        let room: usize = (0..3)
            .filter(|slot| subset & (1 << slot) != 0)
            .map(|slot| capacities[slot] as usize)
            .sum();
        if confined > room {
            let seats = (0..3)
                .filter(|slot| subset & (1 << slot) != 0)
                .map(|slot| opponents[slot])
                .collect();
            return Err(SamplingError::Infeasible(Infeasibility::Overloaded {
                seats,
                cards: confined,
                capacity: room,
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{HandSampler, Infeasibility, SamplingError, binomial};
    use crate::belief::tracker::{Constraint, ConstraintKind, KnowledgeSnapshot};
    use crate::model::card::Card;
    use crate::model::card_set::CardSet;
    use crate::model::player::PlayerPosition;
    use crate::model::suit::Suit;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::HashMap;

    fn set(text: &[&str]) -> CardSet {
        text.iter().map(|t| t.parse::<Card>().unwrap()).collect()
    }

    fn snapshot(own: &[&str], unseen: &[&str], sizes: [u8; 4], constraints: Vec<Constraint>) -> KnowledgeSnapshot {
        KnowledgeSnapshot::from_parts(PlayerPosition::South, set(own), set(unseen), sizes, constraints)
    }

    fn void(player: PlayerPosition, suit: Suit) -> Constraint {
        Constraint {
            player,
            kind: ConstraintKind::Void(suit),
        }
    }

    #[test]
    fn binomials_are_exact() {
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(39, 13), 8_122_425_444);
        assert_eq!(binomial(4, 0), 1);
        assert_eq!(binomial(4, 4), 1);
    }

    #[test]
    fn counts_unconstrained_deals() {
        let snap = snapshot(&["AS"], &["2C", "3C", "4C"], [1, 1, 1, 1], vec![]);
        let sampler = HandSampler::new(&snap).unwrap();
        assert_eq!(sampler.count_deals(), 6);
        assert_eq!(sampler.enumerate(100).len(), 6);
        assert_eq!(sampler.enumerate(4).len(), 4);
    }

    #[test]
    fn full_opening_count_matches_multinomial() {
        let own: Vec<Card> = CardSet::of_suit(Suit::Clubs).to_vec();
        let snap = KnowledgeSnapshot::from_parts(
            PlayerPosition::South,
            CardSet::from_cards(own),
            CardSet::FULL.difference(CardSet::of_suit(Suit::Clubs)),
            [13; 4],
            vec![],
        );
        let sampler = HandSampler::new(&snap).unwrap();
        assert_eq!(sampler.count_deals(), binomial(39, 13) * binomial(26, 13));
    }

    #[test]
    fn voids_are_never_violated_over_many_trials() {
        let own = CardSet::of_suit(Suit::Clubs);
        let unseen = CardSet::FULL.difference(own);
        let snap = KnowledgeSnapshot::from_parts(
            PlayerPosition::South,
            own,
            unseen,
            [13; 4],
            vec![
                void(PlayerPosition::West, Suit::Spades),
                void(PlayerPosition::North, Suit::Hearts),
                Constraint {
                    player: PlayerPosition::East,
                    kind: ConstraintKind::NoQueens,
                },
            ],
        );
        let sampler = HandSampler::new(&snap).unwrap();
        let mut rng = SmallRng::seed_from_u64(2024);
        for _ in 0..10_000 {
            let deal = sampler.sample(&mut rng);
            let west = deal.hand(PlayerPosition::West);
            let north = deal.hand(PlayerPosition::North);
            let east = deal.hand(PlayerPosition::East);
            assert!(west.iter().all(|c| c.suit != Suit::Spades));
            assert!(north.iter().all(|c| c.suit != Suit::Hearts));
            assert!(east.iter().all(|c| !c.is_woman()));
            assert_eq!(west.len(), 13);
            assert_eq!(north.len(), 13);
            assert_eq!(east.len(), 13);
            assert_eq!(west.union(north).union(east), unseen);
            assert_eq!(deal.hand(PlayerPosition::South), own);
        }
    }

    #[test]
    fn draws_are_uniform_on_small_case() {
        // North may not hold hearts, so 2H/3H land with East or West.
        let snap = snapshot(
            &["AS", "KS"],
            &["2H", "3H", "2C", "3C", "4C", "5C"],
            [2, 2, 2, 2],
            vec![void(PlayerPosition::North, Suit::Hearts)],
        );
        let sampler = HandSampler::new(&snap).unwrap();
        let deals = sampler.enumerate(usize::MAX);
        assert_eq!(deals.len() as u128, sampler.count_deals());
        assert_eq!(deals.len(), 36);

        let mut rng = SmallRng::seed_from_u64(7);
        let trials = 36_000;
        let mut counts: HashMap<[CardSet; 4], usize> = HashMap::new();
        for _ in 0..trials {
            *counts.entry(*sampler.sample(&mut rng).hands()).or_default() += 1;
        }
        assert_eq!(counts.len(), 36);
        for (_, count) in counts {
            assert!((700..1300).contains(&count), "count {count} far from 1000");
        }
    }

    #[test]
    fn infeasible_beliefs_are_reported() {
        let snap = snapshot(
            &["AS"],
            &["2H", "3H", "2C"],
            [1, 1, 1, 1],
            vec![void(PlayerPosition::North, Suit::Hearts), void(PlayerPosition::East, Suit::Hearts)],
        );
        assert!(matches!(
            HandSampler::new(&snap),
            Err(SamplingError::Infeasible(Infeasibility::Overloaded { .. }))
        ));

        let all_void = snapshot(
            &["AS"],
            &["2H", "2C", "3C"],
            [1, 1, 1, 1],
            vec![
                void(PlayerPosition::North, Suit::Hearts),
                void(PlayerPosition::East, Suit::Hearts),
                void(PlayerPosition::West, Suit::Hearts),
            ],
        );
        assert_eq!(
            HandSampler::new(&all_void).unwrap_err(),
            SamplingError::Infeasible(Infeasibility::NoEligibleHolder("2H".parse().unwrap()))
        );
    }

    #[test]
    fn relaxation_drops_the_oldest_constraint_once() {
        let snap = snapshot(
            &["AS"],
            &["2H", "3H", "2C"],
            [1, 1, 1, 1],
            vec![void(PlayerPosition::North, Suit::Hearts), void(PlayerPosition::East, Suit::Hearts)],
        );
        let sampler = HandSampler::with_relaxation(&snap).unwrap();
        assert_eq!(sampler.relaxed_constraints(), 1);
        // East still may not hold a heart.
        for deal in sampler.enumerate(usize::MAX) {
            assert!(deal.hand(PlayerPosition::East).iter().all(|c| c.suit != Suit::Hearts));
        }
    }
}
