use crate::continuation::{ContinuationError, TrickContinuation};
use crate::policy::{PublicView, RolloutPolicy, guarded_choice};
use king_core::model::card::Card;
use king_core::model::player::PlayerPosition;
use king_core::model::variant::RoundContext;
use king_core::rules::TrickRules;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Continuation(#[from] ContinuationError),
    #[error("{0} has no legal play")]
    NoLegalPlay(PlayerPosition),
    #[error("{seat} is due to act, not {expected}")]
    NotDecidersTurn {
        seat: PlayerPosition,
        expected: PlayerPosition,
    },
}

/// Score the deciding seat realized over the simulated remainder of the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub score: i32,
    pub tricks: usize,
}

/// Plays one sampled deal to the end of the round.
pub struct SimulationRunner<'a, R: TrickRules + ?Sized> {
    rules: &'a R,
    policy: &'a dyn RolloutPolicy,
    context: &'a RoundContext,
    tricks_completed: usize,
}

impl<'a, R: TrickRules + ?Sized> SimulationRunner<'a, R> {
    /// `tricks_completed` is the number of finished tricks before the one in progress.
    pub fn new(
        rules: &'a R,
        policy: &'a dyn RolloutPolicy,
        context: &'a RoundContext,
        tricks_completed: usize,
    ) -> Self {
        Self {
            rules,
            policy,
            context,
            tricks_completed,
        }
    }

    /// Plays `candidate` for the deciding seat, then lets the policy drive every seat
    /// (the decider included) until all hands are empty.
    pub fn run(&self, candidate: Card, mut continuation: TrickContinuation) -> Result<SimulationOutcome, SimulationError> {
        let decider = continuation.perspective();
        match continuation.next_to_act() {
            Some(seat) if seat == decider => {}
            Some(seat) => {
                return Err(SimulationError::NotDecidersTurn {
                    seat,
                    expected: decider,
                });
            }
            None => return Err(ContinuationError::RoundOver.into()),
        }
        continuation.play(decider, candidate)?;

        let mut index = self.tricks_completed;
        let mut score = 0;
        let mut tricks = 0;
        loop {
            while let Some(seat) = continuation.next_to_act() {
                let hand = continuation.hand(seat).to_vec();
                let legal = self.rules.legal_plays(&hand, continuation.trick(), self.context);
                if legal.is_empty() {
                    return Err(SimulationError::NoLegalPlay(seat));
                }
                let view = PublicView {
                    seat,
                    hand: &hand,
                    trick: continuation.trick(),
                    context: self.context,
                    tricks_completed: index,
                };
                let card = guarded_choice(self.policy, &legal, &view);
                continuation.play(seat, card)?;
            }

            let trick = continuation.trick();
            score += self.rules.trick_points(trick, index, self.context)[decider.index()];
            let winner = self
                .rules
                .resolve_trick(trick, self.context)
                .ok_or(ContinuationError::RoundOver)?;
            index += 1;
            tricks += 1;
            if continuation.is_exhausted() {
                break;
            }
            continuation.start_next(winner)?;
        }

        Ok(SimulationOutcome { score, tricks })
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulationError, SimulationRunner};
    use crate::continuation::TrickContinuation;
    use crate::policy::{HeuristicPolicy, LowestCardPolicy};
    use king_core::belief::SampledDeal;
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

    fn two_trick_deal() -> SampledDeal {
        SampledDeal::from_hands([
            set(&["3S", "4D"]),
            set(&["9S", "5D"]),
            set(&["7S", "KS"]),
            set(&["AS", "2C"]),
        ])
    }

    #[test]
    fn scores_only_the_deciders_tricks() {
        let ctx = RoundContext::new(RoundVariant::Vazas);
        let runner = SimulationRunner::new(&KingRules, &LowestCardPolicy, &ctx, 11);
        let cont = TrickContinuation::fresh(PlayerPosition::South, PlayerPosition::South, &two_trick_deal()).unwrap();

        // South leads KS: West's AS wins, West leads 2C, South's 7S is a discard.
        let outcome = runner.run(card("KS"), cont.clone()).unwrap();
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.tricks, 2);

        // South leads 7S: West wins with AS again (lowest policy still must follow).
        let outcome = runner.run(card("7S"), cont).unwrap();
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn last_round_weights_final_tricks() {
        let ctx = RoundContext::new(RoundVariant::Last);
        let deal = SampledDeal::from_hands([set(&["2S", "4D"]), set(&["3S", "5D"]), set(&["KS", "6D"]), set(&["4S", "2C"])]);
        let runner = SimulationRunner::new(&KingRules, &HeuristicPolicy, &ctx, 11);
        let cont = TrickContinuation::fresh(PlayerPosition::South, PlayerPosition::South, &deal).unwrap();
        // KS wins trick 12 and South must lead 6D into trick 13, which East's 5D cannot beat.
        let outcome = runner.run(card("KS"), cont).unwrap();
        assert_eq!(outcome.score, -180);
    }

    #[test]
    fn resumes_mid_trick_and_rejects_out_of_turn_candidates() {
        let ctx = RoundContext::new(RoundVariant::Vazas);
        let trick = Trick::from_plays(
            PlayerPosition::North,
            &[(PlayerPosition::North, card("5S")), (PlayerPosition::East, card("9S"))],
        )
        .unwrap();
        let deal = SampledDeal::from_hands([set(&["2D"]), set(&["3D"]), set(&["7S", "KS"]), set(&["AS", "QH"])]);
        let runner = SimulationRunner::new(&KingRules, &HeuristicPolicy, &ctx, 11);
        let cont = TrickContinuation::resume(&trick, PlayerPosition::South, &deal).unwrap();
        let outcome = runner.run(card("7S"), cont).unwrap();
        assert_eq!(outcome.tricks, 2);

        let cont = TrickContinuation::resume(&trick, PlayerPosition::West, &deal).unwrap();
        assert!(matches!(
            runner.run(card("AS"), cont),
            Err(SimulationError::NotDecidersTurn { .. })
        ));
    }
}
