mod permutations;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use king_bot::policy::guarded_choice;
use king_bot::{DecisionPhase, EngineConfig, HeuristicPolicy, LowestCardPolicy, MonteCarloPlayer, PublicView};
use king_core::belief::TrackingError;
use king_core::game::{RoundResult, Season};
use king_core::model::card::Card;
use king_core::model::player::PlayerPosition;
use king_core::model::round::RoundState;
use king_core::model::variant::RoundContext;
use king_core::rules::KingRules;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError};
use crate::config::{AgentConfig, AgentKind, ArenaConfig, ResolvedOutputs, ValidationError, round_label};
use crate::telemetry::{TelemetryError, TelemetryOutputs, append_highlights_to_markdown, write_summary_outputs};

pub use permutations::SeatPermutations;

/// Plays seeded King seasons between four configured agents and records every round.
pub struct TournamentRunner {
    config: ArenaConfig,
    outputs: ResolvedOutputs,
    roster: Vec<AgentSpec>,
    schedule: Vec<RoundContext>,
    seatings: SeatPermutations,
}

/// What a finished run produced and where it was written.
pub struct RunSummary {
    pub hands_played: usize,
    pub permutations: usize,
    pub rounds_per_season: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
}

impl TournamentRunner {
    /// Expects a configuration that already passed [`ArenaConfig::validate`].
    pub fn new(config: ArenaConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let roster = config
            .agents
            .iter()
            .map(AgentSpec::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        if roster.len() != 4 {
            return Err(RunnerError::SeatCount { found: roster.len() });
        }
        let schedule = config.schedule()?;
        let seatings = SeatPermutations::new(config.deals.permutations);

        Ok(Self {
            config,
            outputs,
            roster,
            schedule,
            seatings,
        })
    }

    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        let mut sink = RowSink::create(&self.outputs.jsonl)?;
        create_parent_dir(&self.outputs.summary_md)?;
        let mut analytics = AnalyticsCollector::new(&self.config)?;
        let mut seeds = StdRng::seed_from_u64(self.config.deals.seed.unwrap_or(0));

        for hand in 0..self.config.deals.hands {
            let seed = seeds.next_u64();
            for (permutation, seating) in self.seatings.as_slice().iter().enumerate() {
                let key = SeasonKey {
                    hand,
                    permutation,
                    seed,
                };
                let season = self.play_season(key, seating)?;
                for round in &season.rounds {
                    let deal_id = key.deal_id(round.number);
                    analytics.record_round(&deal_id, round)?;
                    sink.write_round(&self.config.run_id, &deal_id, key, &season.seating, round)?;
                }
            }
        }
        let rows_written = sink.finish()?;

        analytics.finalize()?.write_markdown(&self.outputs.summary_md)?;

        let telemetry_path = self.structured_logging().then(|| self.outputs.telemetry_log());
        let telemetry_outputs = match &telemetry_path {
            Some(path) => write_summary_outputs(path, &self.outputs.telemetry_dir())?,
            None => None,
        };
        if let Some(outputs) = &telemetry_outputs {
            append_highlights_to_markdown(&self.outputs.summary_md, outputs)?;
        }

        Ok(RunSummary {
            hands_played: self.config.deals.hands,
            permutations: self.seatings.as_slice().len(),
            rounds_per_season: self.schedule.len(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            telemetry_path,
            telemetry_outputs,
        })
    }

    fn structured_logging(&self) -> bool {
        self.config.logging.enable_structured
    }

    fn play_season(&self, key: SeasonKey, seating: &[usize; 4]) -> Result<SeasonOutcome, RunnerError> {
        let mut seats = seat_roster(&self.roster, seating)?;
        let snapshot = seats.iter().map(Seat::snapshot).collect();
        let mut season = Season::with_schedule(key.seed, self.schedule.clone(), PlayerPosition::North);
        let mut rounds = Vec::with_capacity(season.rounds_total());

        while !season.is_complete() {
            let label = round_label(season.round().context());
            for seat in &mut seats {
                seat.begin_round(season.round());
            }

            while let Some(turn) = season.round().to_act() {
                let card = self.take_turn(&mut seats[turn.index()], season.round(), key, season.round_number());
                season
                    .round_mut()
                    .play_card(turn, card)
                    .map_err(|err| RunnerError::Game {
                        message: format!("{turn} played {card}: {err}"),
                    })?;
                for seat in &mut seats {
                    seat.agent.observe(turn, card).map_err(|source| RunnerError::Tracking {
                        agent: seat.name.clone(),
                        source,
                    })?;
                }
            }

            let result = season
                .finish_round_and_start_next(&KingRules)
                .cloned()
                .ok_or_else(|| RunnerError::Game {
                    message: "completed round was not scored".to_string(),
                })?;
            self.log_round(key, &label, &result);
            rounds.push(RoundOutcome {
                number: result.number,
                variant: label,
                seat_results: seats.iter_mut().map(|seat| seat.settle(&result)).collect(),
            });
        }

        Ok(SeasonOutcome {
            seating: snapshot,
            rounds,
        })
    }

    fn take_turn(&self, seat: &mut Seat, round: &RoundState, key: SeasonKey, round_number: u32) -> Card {
        let legal = round.legal_plays(&KingRules, seat.position);
        let started = Instant::now();
        let card = seat.agent.choose(round, seat.position, &legal);
        let elapsed = started.elapsed();
        seat.clock.record(elapsed, seat.agent.last_phase());

        if self.structured_logging() {
            event!(
                target: "king_bench::play",
                Level::INFO,
                run_id = %self.config.run_id,
                hand = key.hand as u64,
                permutation = key.permutation as u64,
                round = round_number,
                seat = seat_label(seat.position),
                card = %card,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0
            );
        }
        card
    }

    fn log_round(&self, key: SeasonKey, label: &str, result: &RoundResult) {
        if self.structured_logging() {
            event!(
                target: "king_bench::round",
                Level::INFO,
                run_id = %self.config.run_id,
                hand = key.hand as u64,
                permutation = key.permutation as u64,
                round = result.number,
                variant = label,
                points = ?result.points,
                tricks = ?result.tricks_won,
            );
        }
    }
}

pub fn seat_label(position: PlayerPosition) -> &'static str {
    const LABELS: [&str; 4] = ["north", "east", "south", "west"];
    LABELS[position.index()]
}

/// Identifies one season: the dealt hand, the seating it was replayed under and its seed.
#[derive(Debug, Clone, Copy)]
struct SeasonKey {
    hand: usize,
    permutation: usize,
    seed: u64,
}

impl SeasonKey {
    fn deal_id(self, round: u32) -> String {
        format!("H{:05}_P{:02}_R{round}", self.hand, self.permutation)
    }
}

fn create_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// JSONL writer with one row per seat and round.
struct RowSink {
    writer: BufWriter<File>,
    rows: usize,
}

impl RowSink {
    fn create(path: &Path) -> Result<Self, RunnerError> {
        create_parent_dir(path)?;
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            rows: 0,
        })
    }

    fn write_round(
        &mut self,
        run_id: &str,
        deal_id: &str,
        key: SeasonKey,
        seating: &[SeatSnapshot],
        round: &RoundOutcome,
    ) -> Result<(), RunnerError> {
        for result in &round.seat_results {
            let row = DealLogRow {
                run_id,
                deal_id,
                hand_index: key.hand,
                permutation_index: key.permutation,
                deal_seed: key.seed,
                round: round.number,
                variant: &round.variant,
                seat: seat_label(result.seat),
                bot: &result.agent_name,
                seating,
                points: result.points,
                tricks_won: result.tricks_won,
                speed_ms_turn: result.metrics.avg_ms_per_decision,
                decisions: result.metrics.decisions,
                degraded: result.metrics.degraded,
                phases: &result.metrics.phases,
            };
            serde_json::to_writer(&mut self.writer, &row)?;
            self.writer.write_all(b"\n")?;
            self.rows += 1;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<usize, RunnerError> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

#[derive(Serialize)]
struct DealLogRow<'a> {
    run_id: &'a str,
    deal_id: &'a str,
    hand_index: usize,
    permutation_index: usize,
    deal_seed: u64,
    round: u32,
    variant: &'a str,
    seat: &'static str,
    bot: &'a str,
    seating: &'a [SeatSnapshot],
    points: i32,
    tricks_won: u8,
    speed_ms_turn: f64,
    decisions: u32,
    degraded: u32,
    phases: &'a BTreeMap<String, u32>,
}

fn seat_roster(roster: &[AgentSpec], seating: &[usize; 4]) -> Result<Vec<Seat>, RunnerError> {
    PlayerPosition::LOOP
        .iter()
        .zip(seating)
        .map(|(&position, &agent_index)| -> Result<Seat, RunnerError> {
            let spec = roster
                .get(agent_index)
                .ok_or(RunnerError::InvalidPermutation { seat: position, agent_index })?;
            Ok(Seat {
                position,
                name: spec.name.clone(),
                agent: spec.spawn(position),
                clock: SeatClock::default(),
            })
        })
        .collect()
}

struct Seat {
    position: PlayerPosition,
    name: String,
    agent: SeatAgent,
    clock: SeatClock,
}

impl Seat {
    fn snapshot(&self) -> SeatSnapshot {
        SeatSnapshot {
            seat: seat_label(self.position).to_string(),
            bot: self.name.clone(),
        }
    }

    fn begin_round(&mut self, round: &RoundState) {
        self.agent.start_round(round, self.position);
        self.clock = SeatClock::default();
    }

    /// Takes this seat's share of a scored round and resets its clock.
    fn settle(&mut self, result: &RoundResult) -> SeatResult {
        let index = self.position.index();
        SeatResult {
            agent_name: self.name.clone(),
            seat: self.position,
            points: result.points[index],
            tricks_won: result.tricks_won[index],
            metrics: std::mem::take(&mut self.clock).summary(),
        }
    }
}

/// The thing actually sitting at a seat during a season.
enum SeatAgent {
    Heuristic(HeuristicPolicy),
    Lowest(LowestCardPolicy),
    MonteCarlo(Box<MonteCarloPlayer>),
}

impl SeatAgent {
    fn start_round(&mut self, round: &RoundState, seat: PlayerPosition) {
        if let SeatAgent::MonteCarlo(player) = self {
            player.reset_for_new_round(round.context(), round.hand(seat));
        }
    }

    fn choose(&mut self, round: &RoundState, seat: PlayerPosition, legal: &[Card]) -> Card {
        let view = PublicView {
            seat,
            hand: round.hand(seat).cards(),
            trick: round.current_trick(),
            context: round.context(),
            tricks_completed: round.tricks_completed(),
        };
        match self {
            SeatAgent::Heuristic(policy) => guarded_choice(&*policy, legal, &view),
            SeatAgent::Lowest(policy) => guarded_choice(&*policy, legal, &view),
            SeatAgent::MonteCarlo(player) => player.choose_card(legal, round.current_trick()),
        }
    }

    fn observe(&mut self, player: PlayerPosition, card: Card) -> Result<(), TrackingError> {
        match self {
            SeatAgent::MonteCarlo(mc) => mc.observe(player, card),
            SeatAgent::Heuristic(_) | SeatAgent::Lowest(_) => Ok(()),
        }
    }

    fn last_phase(&self) -> Option<(DecisionPhase, bool)> {
        match self {
            SeatAgent::MonteCarlo(player) => player.last_decision().map(|d| (d.phase, d.degraded)),
            SeatAgent::Heuristic(_) | SeatAgent::Lowest(_) => None,
        }
    }
}

/// Per-round decision timing for one seat.
#[derive(Default)]
struct SeatClock {
    spent: Duration,
    turns: u32,
    degraded: u32,
    phases: BTreeMap<String, u32>,
}

impl SeatClock {
    fn record(&mut self, elapsed: Duration, decision: Option<(DecisionPhase, bool)>) {
        self.spent += elapsed;
        self.turns += 1;
        if let Some((phase, degraded)) = decision {
            *self.phases.entry(phase.as_str().to_owned()).or_insert(0) += 1;
            self.degraded += u32::from(degraded);
        }
    }

    fn summary(self) -> DecisionSummary {
        let total_ms = self.spent.as_secs_f64() * 1000.0;
        let avg_ms_per_decision = match self.turns {
            0 => 0.0,
            turns => total_ms / f64::from(turns),
        };
        DecisionSummary {
            decisions: self.turns,
            avg_ms_per_decision,
            total_ms,
            degraded: self.degraded,
            phases: self.phases,
        }
    }
}

pub struct SeasonOutcome {
    pub seating: Vec<SeatSnapshot>,
    pub rounds: Vec<RoundOutcome>,
}

pub struct RoundOutcome {
    pub number: u32,
    pub variant: String,
    pub seat_results: Vec<SeatResult>,
}

#[derive(Clone, Serialize)]
pub struct SeatSnapshot {
    pub seat: String,
    pub bot: String,
}

pub struct SeatResult {
    pub agent_name: String,
    pub seat: PlayerPosition,
    pub points: i32,
    pub tricks_won: u8,
    pub metrics: DecisionSummary,
}

#[derive(Clone)]
pub struct DecisionSummary {
    pub decisions: u32,
    pub avg_ms_per_decision: f64,
    pub total_ms: f64,
    pub degraded: u32,
    /// Engine decisions per phase; empty for policy agents.
    pub phases: BTreeMap<String, u32>,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Config(#[from] ValidationError),
    #[error("arena I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode a result row: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("season aborted: {message}")]
    Game { message: String },
    #[error("agent '{agent}' lost track of the round: {source}")]
    Tracking {
        agent: String,
        #[source]
        source: TrackingError,
    },
    #[error("an arena seats exactly four agents, {found} configured")]
    SeatCount { found: usize },
    #[error("seating places missing agent #{agent_index} at {seat}")]
    InvalidPermutation { seat: PlayerPosition, agent_index: usize },
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid parameters for agent '{name}': {message}")]
    InvalidParams { name: String, message: String },
}

/// A configured agent; a fresh instance is spawned for every seat it takes.
struct AgentSpec {
    name: String,
    build: AgentBuild,
}

enum AgentBuild {
    Heuristic,
    Lowest,
    MonteCarlo(EngineConfig),
}

impl AgentSpec {
    fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let build = match config.kind {
            AgentKind::Heuristic => AgentBuild::Heuristic,
            AgentKind::Lowest => AgentBuild::Lowest,
            AgentKind::MonteCarlo => {
                let engine = config.engine_config().map_err(|err| AgentError::InvalidParams {
                    name: config.name.clone(),
                    message: err.to_string(),
                })?;
                AgentBuild::MonteCarlo(engine)
            }
        };
        Ok(Self {
            name: config.name.clone(),
            build,
        })
    }

    fn spawn(&self, seat: PlayerPosition) -> SeatAgent {
        match &self.build {
            AgentBuild::Heuristic => SeatAgent::Heuristic(HeuristicPolicy::new()),
            AgentBuild::Lowest => SeatAgent::Lowest(LowestCardPolicy),
            AgentBuild::MonteCarlo(engine) => {
                SeatAgent::MonteCarlo(Box::new(MonteCarloPlayer::new(seat, engine.clone())))
            }
        }
    }
}
