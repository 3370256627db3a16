use crate::model::deck::Deck;
use crate::model::player::PlayerPosition;
use crate::model::round::RoundState;
use crate::model::score::ScoreBoard;
use crate::model::variant::{FestaMode, RoundContext, RoundVariant};
use crate::rules::TrickRules;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

/// Outcome of one finished round of a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundResult {
    pub number: u32,
    pub variant: RoundVariant,
    pub festa: Option<FestaMode>,
    pub points: [i32; 4],
    pub tricks_won: [u8; 4],
}

/// A seeded sequence of rounds played with the same four seats.
#[derive(Debug, Clone)]
pub struct Season {
    schedule: Vec<RoundContext>,
    round_index: usize,
    current_round: RoundState,
    scores: ScoreBoard,
    results: Vec<RoundResult>,
    rng: StdRng,
    seed: u64,
}

impl Season {
    /// Penalty rounds in table order, closed by a nulos Festa.
    pub fn standard_schedule() -> Vec<RoundContext> {
        let mut schedule: Vec<RoundContext> = RoundVariant::PENALTIES.iter().map(|&v| RoundContext::new(v)).collect();
        schedule.push(RoundContext::festa(FestaMode::Nulos));
        schedule
    }

    pub fn with_seed(seed: u64, starting_player: PlayerPosition) -> Self {
        Self::with_schedule(seed, Self::standard_schedule(), starting_player)
    }

    /// An empty `schedule` falls back to the standard one.
    pub fn with_schedule(seed: u64, schedule: Vec<RoundContext>, starting_player: PlayerPosition) -> Self {
        let schedule = if schedule.is_empty() {
            Self::standard_schedule()
        } else {
            schedule
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let deck = Deck::shuffled(&mut rng);
        let current_round = RoundState::deal(&deck, starting_player, schedule[0].clone());
        Self {
            schedule,
            round_index: 0,
            current_round,
            scores: ScoreBoard::new(),
            results: Vec::new(),
            rng,
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    pub fn round(&self) -> &RoundState {
        &self.current_round
    }

    pub fn round_mut(&mut self) -> &mut RoundState {
        &mut self.current_round
    }

    /// 1-based number of the round in progress.
    pub fn round_number(&self) -> u32 {
        self.round_index as u32 + 1
    }

    pub fn rounds_total(&self) -> usize {
        self.schedule.len()
    }

    pub fn results(&self) -> &[RoundResult] {
        &self.results
    }

    pub fn is_round_ready_for_scoring(&self) -> bool {
        self.current_round.is_finished()
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() == self.schedule.len()
    }

    /// Scores the finished round into the season and deals the next one. Returns `None`
    /// when the round is still in play or the season is already over.
    pub fn finish_round_and_start_next<R: TrickRules + ?Sized>(&mut self, rules: &R) -> Option<&RoundResult> {
        if self.is_complete() || !self.is_round_ready_for_scoring() {
            return None;
        }
        let points = self.current_round.final_scores(rules);
        self.scores.apply_round(points);

        let mut tricks_won = [0u8; 4];
        for trick in self.current_round.trick_history() {
            if let Some(winner) = rules.resolve_trick(trick, self.current_round.context()) {
                tricks_won[winner.index()] += 1;
            }
        }
        let context = self.current_round.context();
        self.results.push(RoundResult {
            number: self.round_number(),
            variant: context.variant(),
            festa: context.festa_mode(),
            points,
            tricks_won,
        });

        if self.round_index + 1 < self.schedule.len() {
            self.round_index += 1;
            let next_starting_player = self.current_round.starting_player().next();
            let deck = Deck::shuffled(&mut self.rng);
            self.current_round = RoundState::deal(
                &deck,
                next_starting_player,
                self.schedule[self.round_index].clone(),
            );
        }
        self.results.last()
    }
}
