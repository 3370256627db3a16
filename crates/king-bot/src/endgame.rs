//! Exhaustive search over every consistent deal when few cards remain.

use crate::config::{EndgameConfig, OpponentModel};
use crate::continuation::TrickContinuation;
use crate::policy::{PublicView, RolloutPolicy, guarded_choice};
use crate::stats::{CandidateStats, best_candidate};
use king_core::belief::{HandSampler, KnowledgeSnapshot, SampledDeal};
use king_core::model::card::Card;
use king_core::model::player::PlayerPosition;
use king_core::model::trick::Trick;
use king_core::model::variant::RoundContext;
use king_core::rules::TrickRules;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EndgameResult {
    pub card: Card,
    pub stats: Vec<CandidateStats>,
    pub deals: usize,
    pub nodes: u64,
}

/// Shared node budget and deadline for one solve.
struct SearchBudget {
    nodes: AtomicU64,
    limit: u64,
    deadline: Option<Instant>,
    aborted: AtomicBool,
}

impl SearchBudget {
    fn tick(&self) -> Option<()> {
        if self.aborted.load(Ordering::Relaxed) {
            return None;
        }
        let used = self.nodes.fetch_add(1, Ordering::Relaxed) + 1;
        let late = used % 1024 == 0 && self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if used > self.limit || late {
            self.aborted.store(true, Ordering::Relaxed);
            return None;
        }
        Some(())
    }
}

pub struct EndgameSolver<'a, R: TrickRules + ?Sized> {
    rules: &'a R,
    policy: &'a dyn RolloutPolicy,
    config: &'a EndgameConfig,
    context: &'a RoundContext,
    parallel: bool,
}

impl<'a, R: TrickRules + ?Sized> EndgameSolver<'a, R> {
    pub fn new(
        rules: &'a R,
        policy: &'a dyn RolloutPolicy,
        config: &'a EndgameConfig,
        context: &'a RoundContext,
        parallel: bool,
    ) -> Self {
        Self {
            rules,
            policy,
            config,
            context,
            parallel,
        }
    }

    /// Whether the information set is small enough to enumerate. Returns the sampler
    /// to reuse when it is.
    pub fn applicable(&self, snapshot: &KnowledgeSnapshot) -> Option<HandSampler> {
        if !self.config.enabled || snapshot.own_hand().len() > self.config.max_hand {
            return None;
        }
        let sampler = HandSampler::with_relaxation(snapshot).ok()?;
        let deals = sampler.count_deals();
        (deals > 0 && deals <= self.config.max_deals as u128).then_some(sampler)
    }

    /// Evaluates every candidate against every consistent deal. `None` means the
    /// preconditions failed or the search ran out of nodes or time.
    pub fn solve(
        &self,
        snapshot: &KnowledgeSnapshot,
        trick: &Trick,
        candidates: &[Card],
        tricks_completed: usize,
        deadline: Option<Instant>,
    ) -> Option<EndgameResult> {
        let sampler = self.applicable(snapshot)?;
        let deals = sampler.enumerate(self.config.max_deals);
        self.solve_deals(&deals, snapshot.perspective(), trick, candidates, tricks_completed, deadline)
    }

    /// Evaluates `candidates` against an explicit list of deals.
    pub fn solve_deals(
        &self,
        deals: &[SampledDeal],
        perspective: PlayerPosition,
        trick: &Trick,
        candidates: &[Card],
        tricks_completed: usize,
        deadline: Option<Instant>,
    ) -> Option<EndgameResult> {
        if deals.is_empty() || candidates.is_empty() {
            return None;
        }
        let budget = SearchBudget {
            nodes: AtomicU64::new(0),
            limit: self.config.node_budget,
            deadline,
            aborted: AtomicBool::new(false),
        };

        let tasks: Vec<(usize, usize)> = (0..deals.len())
            .flat_map(|d| (0..candidates.len()).map(move |c| (d, c)))
            .collect();
        let evaluate = |&(d, c): &(usize, usize)| -> Option<(usize, i32)> {
            let mut cont = TrickContinuation::resume(trick, perspective, &deals[d]).ok()?;
            cont.play(perspective, candidates[c]).ok()?;
            let value = self.search(&cont, tricks_completed, &budget)?;
            Some((c, value))
        };
        let values: Vec<Option<(usize, i32)>> = if self.parallel {
            tasks.par_iter().map(evaluate).collect()
        } else {
            tasks.iter().map(evaluate).collect()
        };

        let mut stats: Vec<CandidateStats> = candidates.iter().map(|&card| CandidateStats::new(card)).collect();
        for value in values {
            let (c, score) = value?;
            stats[c].record(score);
        }
        let card = best_candidate(&stats)?.card;
        let nodes = budget.nodes.load(Ordering::Relaxed);
        debug!(
            target: "king_bot::endgame",
            deals = deals.len(),
            nodes,
            chosen = %card,
            model = ?self.config.opponent_model,
            "endgame solved"
        );
        Some(EndgameResult {
            card,
            stats,
            deals: deals.len(),
            nodes,
        })
    }

    /// Value for the deciding seat of the rest of the round from `cont`.
    fn search(&self, cont: &TrickContinuation, index: usize, budget: &SearchBudget) -> Option<i32> {
        budget.tick()?;
        let decider = cont.perspective();
        let Some(seat) = cont.next_to_act() else {
            let points = self.rules.trick_points(cont.trick(), index, self.context)[decider.index()];
            if cont.is_exhausted() {
                return Some(points);
            }
            let winner = self.rules.resolve_trick(cont.trick(), self.context)?;
            let mut next = cont.clone();
            next.start_next(winner).ok()?;
            return Some(points + self.search(&next, index + 1, budget)?);
        };

        let hand = cont.hand(seat).to_vec();
        let legal = self.rules.legal_plays(&hand, cont.trick(), self.context);
        if seat != decider && self.config.opponent_model == OpponentModel::PolicyFollowing {
            let view = PublicView {
                seat,
                hand: &hand,
                trick: cont.trick(),
                context: self.context,
                tricks_completed: index,
            };
            let card = guarded_choice(self.policy, &legal, &view);
            let mut next = cont.clone();
            next.play(seat, card).ok()?;
            return self.search(&next, index, budget);
        }

        let mut value: Option<i32> = None;
        for card in legal {
            let mut next = cont.clone();
            next.play(seat, card).ok()?;
            let child = self.search(&next, index, budget)?;
            value = Some(match value {
                None => child,
                Some(current) if seat == decider => current.max(child),
                Some(current) => current.min(child),
            });
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::EndgameSolver;
    use crate::config::{EndgameConfig, OpponentModel};
    use crate::policy::LowestCardPolicy;
    use king_core::belief::{KnowledgeSnapshot, SampledDeal};
    use king_core::model::card::Card;
    use king_core::model::card_set::CardSet;
    use king_core::model::player::PlayerPosition;
    use king_core::model::trick::Trick;
    use king_core::model::variant::{RoundContext, RoundVariant};
    use king_core::rules::KingRules;

    fn set(text: &[&str]) -> CardSet {
        text.iter().map(|t| t.parse::<Card>().unwrap()).collect()
    }

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    #[test]
    fn known_two_card_endgame_ducks_the_last_trick() {
        // Leading 3S loses to East's 9S and South discards KS on East's 5D lead.
        // Leading KS wins trick 12 and forces South to win trick 13 with 3S.
        let deal = SampledDeal::from_hands([
            set(&["2S", "4D"]),
            set(&["9S", "5D"]),
            set(&["3S", "KS"]),
            set(&["4S", "2C"]),
        ]);
        let ctx = RoundContext::new(RoundVariant::Last);
        let config = EndgameConfig::default();
        let solver = EndgameSolver::new(&KingRules, &LowestCardPolicy, &config, &ctx, false);
        let result = solver
            .solve_deals(
                &[deal],
                PlayerPosition::South,
                &Trick::new(PlayerPosition::South),
                &[card("3S"), card("KS")],
                11,
                None,
            )
            .unwrap();
        let by_card = |c: &str| result.stats.iter().find(|s| s.card == card(c)).unwrap().total;
        assert_eq!(by_card("KS"), -180);
        assert_eq!(by_card("3S"), 0);
        assert_eq!(result.card, card("3S"));
    }

    #[test]
    fn preconditions_gate_on_hand_and_deal_count() {
        let ctx = RoundContext::new(RoundVariant::Vazas);
        let config = EndgameConfig::default();
        let solver = EndgameSolver::new(&KingRules, &LowestCardPolicy, &config, &ctx, false);

        let small = KnowledgeSnapshot::from_parts(
            PlayerPosition::South,
            set(&["7S", "KS"]),
            set(&["AS", "QH", "4D", "JC", "2C", "3C"]),
            [2, 2, 2, 2],
            vec![],
        );
        assert!(solver.applicable(&small).is_some());

        let big = KnowledgeSnapshot::from_parts(
            PlayerPosition::South,
            set(&["7S", "KS", "8S", "9S"]),
            CardSet::of_suit(king_core::model::suit::Suit::Hearts).difference(set(&["AH"])),
            [4, 4, 4, 4],
            vec![],
        );
        assert!(solver.applicable(&big).is_none());
    }

    #[test]
    fn exhausted_node_budget_falls_back() {
        let ctx = RoundContext::new(RoundVariant::Vazas);
        let config = EndgameConfig {
            node_budget: 3,
            opponent_model: OpponentModel::Adversarial,
            ..EndgameConfig::default()
        };
        let solver = EndgameSolver::new(&KingRules, &LowestCardPolicy, &config, &ctx, false);
        let deal = SampledDeal::from_hands([
            set(&["2S", "4D"]),
            set(&["9S", "5D"]),
            set(&["3S", "KS"]),
            set(&["4S", "2C"]),
        ]);
        assert!(
            solver
                .solve_deals(
                    &[deal],
                    PlayerPosition::South,
                    &Trick::new(PlayerPosition::South),
                    &[card("3S"), card("KS")],
                    11,
                    None,
                )
                .is_none()
        );
    }
}
