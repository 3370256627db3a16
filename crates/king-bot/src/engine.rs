//! Decision facade: picks a phase, runs it, and always lands on one legal card.

use crate::config::EngineConfig;
use crate::continuation::{ContinuationError, TrickContinuation};
use crate::endgame::EndgameSolver;
use crate::policy::{HeuristicPolicy, PublicView, RolloutPolicy, guarded_choice};
use crate::scheduler::AdaptiveScheduler;
use crate::simulation::SimulationRunner;
use crate::stats::{CandidateStats, best_candidate};
use king_core::belief::{CardKnowledgeTracker, HandSampler, SampledDeal, SamplingError};
use king_core::model::card::Card;
use king_core::model::player::PlayerPosition;
use king_core::model::trick::Trick;
use king_core::rules::{KingRules, TrickRules};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{Level, event};

/// Shared flag that stops a decision before its next simulation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPhase {
    Forced,
    EarlyHeuristic,
    EndgameExact,
    MonteCarlo,
    Fallback,
}

impl DecisionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionPhase::Forced => "forced",
            DecisionPhase::EarlyHeuristic => "early_heuristic",
            DecisionPhase::EndgameExact => "endgame_exact",
            DecisionPhase::MonteCarlo => "monte_carlo",
            DecisionPhase::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub card: Card,
    pub phase: DecisionPhase,
    pub stats: Vec<CandidateStats>,
    /// Simulations or endgame deals evaluated per candidate, summed.
    pub samples: usize,
    pub degraded: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("no legal plays were offered")]
    NoLegalPlays,
    #[error("{seat} is not due to act in this trick")]
    NotOurTurn { seat: PlayerPosition },
    #[error("belief state admits no consistent deal: {0}")]
    SamplingInfeasible(#[from] SamplingError),
    #[error(transparent)]
    Continuation(#[from] ContinuationError),
}

/// Chooses cards for one seat from its tracked knowledge.
pub struct DecisionEngine<R: TrickRules = KingRules> {
    rules: R,
    policy: Arc<dyn RolloutPolicy>,
    heuristic: HeuristicPolicy,
    config: EngineConfig,
    cancel: Option<CancelToken>,
}

impl DecisionEngine<KingRules> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rules(KingRules, config)
    }
}

impl Default for DecisionEngine<KingRules> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<R: TrickRules> DecisionEngine<R> {
    pub fn with_rules(rules: R, config: EngineConfig) -> Self {
        Self {
            rules,
            policy: Arc::new(HeuristicPolicy::new()),
            heuristic: HeuristicPolicy::new(),
            config,
            cancel: None,
        }
    }

    /// Replaces the rollout policy used inside simulations.
    pub fn with_policy(mut self, policy: Arc<dyn RolloutPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    /// Like [`DecisionEngine::try_decide`], but every recoverable failure becomes a
    /// degraded heuristic decision. Panics when `legal` is empty.
    pub fn decide(&self, tracker: &CardKnowledgeTracker, legal: &[Card], trick: &Trick) -> Decision {
        assert!(!legal.is_empty(), "decide called without legal plays");
        let started = Instant::now();
        match self.try_decide(tracker, legal, trick) {
            Ok(decision) => decision,
            Err(err) => {
                event!(
                    target: "king_bot::engine",
                    Level::WARN,
                    seat = %tracker.perspective(),
                    error = %err,
                    "decision degraded to heuristic"
                );
                self.fallback(tracker, legal, trick, started)
            }
        }
    }

    pub fn try_decide(
        &self,
        tracker: &CardKnowledgeTracker,
        legal: &[Card],
        trick: &Trick,
    ) -> Result<Decision, DecisionError> {
        let started = Instant::now();
        let seat = tracker.perspective();
        if legal.is_empty() {
            return Err(DecisionError::NoLegalPlays);
        }
        if trick.next_to_act() != Some(seat) {
            return Err(DecisionError::NotOurTurn { seat });
        }

        let mut candidates = legal.to_vec();
        candidates.sort_by_key(|card| (card.suit, card.rank));
        candidates.dedup();

        if candidates.len() == 1 {
            return Ok(self.finish(tracker, candidates[0], DecisionPhase::Forced, Vec::new(), 0, false, started));
        }
        if tracker.cards_played() < self.config.early_heuristic_cards {
            let card = self.heuristic_card(tracker, &candidates, trick);
            return Ok(self.finish(tracker, card, DecisionPhase::EarlyHeuristic, Vec::new(), 0, false, started));
        }

        let deadline = started + self.config.latency_budget();
        let snapshot = tracker.snapshot();
        let context = tracker.context();
        let solver = EndgameSolver::new(
            &self.rules,
            self.policy.as_ref(),
            &self.config.endgame,
            context,
            self.config.parallel,
        );
        if let Some(result) = solver.solve(&snapshot, trick, &candidates, tricks_before(tracker), Some(deadline)) {
            return Ok(self.finish(
                tracker,
                result.card,
                DecisionPhase::EndgameExact,
                result.stats,
                result.deals,
                false,
                started,
            ));
        }

        let sampler = HandSampler::with_relaxation(&snapshot)?;
        let scheduler = AdaptiveScheduler::new(&self.config.scheduler, context);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let per_candidate = scheduler.plan(snapshot.own_hand().len(), candidates.len(), remaining);

        let base_seed = self.config.seed ^ tracker.cards_played() as u64;
        let deals: Vec<SampledDeal> = (0..per_candidate)
            .map(|i| sampler.sample(&mut SmallRng::seed_from_u64(mix_seed(base_seed, i as u64))))
            .collect();

        // Reject a malformed trick once rather than once per rollout.
        if let Some(deal) = deals.first() {
            TrickContinuation::resume(trick, seat, deal)?;
        }

        let runner = SimulationRunner::new(&self.rules, self.policy.as_ref(), context, tricks_before(tracker));
        let tasks: Vec<(usize, usize)> = (0..deals.len())
            .flat_map(|sample| (0..candidates.len()).map(move |candidate| (sample, candidate)))
            .collect();
        let simulate = |&(sample, candidate): &(usize, usize)| -> Option<(usize, i32)> {
            if Instant::now() >= deadline || self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            let continuation = TrickContinuation::resume(trick, seat, &deals[sample]).ok()?;
            match runner.run(candidates[candidate], continuation) {
                Ok(outcome) => Some((candidate, outcome.score)),
                Err(err) => {
                    event!(
                        target: "king_bot::engine",
                        Level::WARN,
                        %seat,
                        candidate = %candidates[candidate],
                        error = %err,
                        "rollout failed"
                    );
                    None
                }
            }
        };
        let outcomes: Vec<Option<(usize, i32)>> = if self.config.parallel {
            tasks.par_iter().map(simulate).collect()
        } else {
            tasks.iter().map(simulate).collect()
        };

        let mut stats: Vec<CandidateStats> = candidates.iter().map(|&card| CandidateStats::new(card)).collect();
        for (candidate, score) in outcomes.into_iter().flatten() {
            stats[candidate].record(score);
        }
        let samples = stats.iter().map(|s| s.samples).sum();

        if stats.iter().any(CandidateStats::is_empty) {
            event!(
                target: "king_bot::engine",
                Level::WARN,
                %seat,
                planned = tasks.len(),
                completed = samples,
                "deadline or cancellation left a candidate unevaluated"
            );
            let card = self.heuristic_card(tracker, &candidates, trick);
            return Ok(self.finish(tracker, card, DecisionPhase::Fallback, stats, samples, true, started));
        }

        let card = best_candidate(&stats).map_or(candidates[0], |best| best.card);
        let degraded = samples < tasks.len();
        Ok(self.finish(tracker, card, DecisionPhase::MonteCarlo, stats, samples, degraded, started))
    }

    fn fallback(&self, tracker: &CardKnowledgeTracker, legal: &[Card], trick: &Trick, started: Instant) -> Decision {
        let card = self.heuristic_card(tracker, legal, trick);
        Decision {
            card,
            phase: DecisionPhase::Fallback,
            stats: Vec::new(),
            samples: 0,
            degraded: true,
            elapsed: started.elapsed(),
        }
    }

    fn heuristic_card(&self, tracker: &CardKnowledgeTracker, legal: &[Card], trick: &Trick) -> Card {
        let hand = tracker.own_hand();
        let view = PublicView {
            seat: tracker.perspective(),
            hand: &hand,
            trick,
            context: tracker.context(),
            tricks_completed: tricks_before(tracker),
        };
        guarded_choice(&self.heuristic, legal, &view)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        tracker: &CardKnowledgeTracker,
        card: Card,
        phase: DecisionPhase,
        stats: Vec<CandidateStats>,
        samples: usize,
        degraded: bool,
        started: Instant,
    ) -> Decision {
        let elapsed = started.elapsed();
        event!(
            target: "king_bot::engine",
            Level::DEBUG,
            seat = %tracker.perspective(),
            variant = %tracker.context().variant(),
            phase = phase.as_str(),
            chosen = %card,
            candidates = stats.len(),
            samples,
            degraded,
            elapsed_us = elapsed.as_micros() as u64,
            "decision"
        );
        Decision {
            card,
            phase,
            stats,
            samples,
            degraded,
            elapsed,
        }
    }
}

/// Tricks finished before the one being decided.
fn tricks_before(tracker: &CardKnowledgeTracker) -> usize {
    tracker.tricks_completed()
}

/// SplitMix64 finalizer over the decision seed and the sample index.
fn mix_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, DecisionEngine, DecisionError, DecisionPhase, mix_seed};
    use crate::config::EngineConfig;
    use crate::policy::LowestCardPolicy;
    use king_core::belief::CardKnowledgeTracker;
    use king_core::model::deck::Deck;
    use king_core::model::player::PlayerPosition;
    use king_core::model::round::RoundState;
    use king_core::model::trick::Trick;
    use king_core::model::variant::{RoundContext, RoundVariant};
    use king_core::rules::KingRules;
    use std::sync::Arc;

    fn sequential() -> EngineConfig {
        EngineConfig {
            parallel: false,
            latency_budget_ms: 60_000,
            ..EngineConfig::default()
        }
    }

    /// Plays `count` cards of a seeded round with the lowest legal card for everyone,
    /// feeding the plays to South's tracker.
    fn advanced_round(variant: RoundVariant, count: usize) -> (RoundState, CardKnowledgeTracker) {
        let ctx = RoundContext::new(variant);
        let mut round = RoundState::deal(&Deck::shuffled_with_seed(7), PlayerPosition::North, ctx.clone());
        let south = PlayerPosition::South;
        let mut tracker = CardKnowledgeTracker::new(south, round.hand(south).cards(), &ctx);
        for _ in 0..count {
            let seat = round.to_act().unwrap();
            let legal = round.legal_plays(&KingRules, seat);
            let choice = legal.iter().copied().min_by_key(|c| c.tie_break_key()).unwrap();
            round.play_card(seat, choice).unwrap();
            tracker.observe(seat, choice).unwrap();
        }
        (round, tracker)
    }

    fn advance_to_south(variant: RoundVariant, at_least: usize) -> (RoundState, CardKnowledgeTracker) {
        let mut count = at_least;
        loop {
            let (round, tracker) = advanced_round(variant, count);
            if round.to_act() == Some(PlayerPosition::South)
                && round.legal_plays(&KingRules, PlayerPosition::South).len() > 1
            {
                return (round, tracker);
            }
            count += 1;
        }
    }

    fn current_trick(round: &RoundState) -> Trick {
        round.current_trick().clone()
    }

    #[test]
    fn single_legal_play_is_forced() {
        let (round, tracker) = advance_to_south(RoundVariant::Vazas, 8);
        let engine = DecisionEngine::new(sequential());
        let only = round.legal_plays(&KingRules, PlayerPosition::South)[0];
        let decision = engine.try_decide(&tracker, &[only], &current_trick(&round)).unwrap();
        assert_eq!(decision.phase, DecisionPhase::Forced);
        assert_eq!(decision.card, only);
    }

    #[test]
    fn opening_plays_use_the_heuristic() {
        let (round, tracker) = advance_to_south(RoundVariant::Copas, 0);
        assert!(tracker.cards_played() < 4);
        let engine = DecisionEngine::new(sequential());
        let legal = round.legal_plays(&KingRules, PlayerPosition::South);
        let decision = engine.try_decide(&tracker, &legal, &current_trick(&round)).unwrap();
        assert_eq!(decision.phase, DecisionPhase::EarlyHeuristic);
        assert!(legal.contains(&decision.card));
    }

    #[test]
    fn midgame_runs_monte_carlo_with_equal_samples() {
        let (round, tracker) = advance_to_south(RoundVariant::Homens, 12);
        let config = EngineConfig {
            scheduler: crate::config::SchedulerConfig {
                base_samples: 20,
                ..Default::default()
            },
            ..sequential()
        };
        let engine = DecisionEngine::new(config);
        let legal = round.legal_plays(&KingRules, PlayerPosition::South);
        let decision = engine.try_decide(&tracker, &legal, &current_trick(&round)).unwrap();
        assert_eq!(decision.phase, DecisionPhase::MonteCarlo);
        assert!(legal.contains(&decision.card));
        assert!(!decision.degraded);
        let first = decision.stats[0].samples;
        assert!(first >= 20);
        assert!(decision.stats.iter().all(|s| s.samples == first));
    }

    #[test]
    fn same_seed_same_card() {
        let (round, tracker) = advance_to_south(RoundVariant::King, 16);
        let legal = round.legal_plays(&KingRules, PlayerPosition::South);
        let trick = current_trick(&round);
        let a = DecisionEngine::new(sequential()).decide(&tracker, &legal, &trick);
        let b = DecisionEngine::new(EngineConfig {
            parallel: true,
            ..sequential()
        })
        .decide(&tracker, &legal, &trick);
        assert_eq!(a.card, b.card);
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn cancelled_decision_degrades_to_heuristic() {
        let (round, tracker) = advance_to_south(RoundVariant::Vazas, 12);
        let token = CancelToken::new();
        token.cancel();
        let engine = DecisionEngine::new(sequential()).with_cancel_token(token);
        let legal = round.legal_plays(&KingRules, PlayerPosition::South);
        let decision = engine.decide(&tracker, &legal, &current_trick(&round));
        assert_eq!(decision.phase, DecisionPhase::Fallback);
        assert!(decision.degraded);
        assert!(legal.contains(&decision.card));
    }

    #[test]
    fn reset_token_lets_the_search_run() {
        let (round, tracker) = advance_to_south(RoundVariant::Vazas, 12);
        let token = CancelToken::new();
        token.cancel();
        token.reset();
        let engine = DecisionEngine::new(sequential()).with_cancel_token(token.clone());
        let legal = round.legal_plays(&KingRules, PlayerPosition::South);
        let decision = engine.decide(&tracker, &legal, &current_trick(&round));
        assert!(!token.is_cancelled());
        assert_ne!(decision.phase, DecisionPhase::Fallback);
        assert!(!decision.degraded);
    }

    #[test]
    fn rollouts_can_use_another_policy() {
        let (round, tracker) = advance_to_south(RoundVariant::Mulheres, 12);
        let engine = DecisionEngine::new(sequential()).with_policy(Arc::new(LowestCardPolicy));
        let legal = round.legal_plays(&KingRules, PlayerPosition::South);
        let decision = engine.try_decide(&tracker, &legal, &current_trick(&round)).unwrap();
        assert!(legal.contains(&decision.card));
        assert!(matches!(
            decision.phase,
            DecisionPhase::MonteCarlo | DecisionPhase::EndgameExact
        ));
    }

    #[test]
    fn empty_legal_set_and_wrong_turn_are_errors() {
        let (round, tracker) = advance_to_south(RoundVariant::Vazas, 8);
        let engine = DecisionEngine::new(sequential());
        let trick = current_trick(&round);
        assert_eq!(
            engine.try_decide(&tracker, &[], &trick).unwrap_err(),
            DecisionError::NoLegalPlays
        );
        let other = Trick::new(PlayerPosition::North);
        let legal = round.legal_plays(&KingRules, PlayerPosition::South);
        assert!(matches!(
            engine.try_decide(&tracker, &legal, &other),
            Err(DecisionError::NotOurTurn { .. })
        ));
        assert!(legal.contains(&engine.decide(&tracker, &legal, &other).card));
    }

    #[test]
    fn seed_mixing_spreads_indices() {
        assert_ne!(mix_seed(1, 0), mix_seed(1, 1));
        assert_ne!(mix_seed(1, 0), mix_seed(2, 0));
    }
}
