pub mod config;
pub mod continuation;
pub mod endgame;
pub mod engine;
pub mod player;
pub mod policy;
pub mod scheduler;
pub mod simulation;
pub mod stats;

pub use config::{EndgameConfig, EngineConfig, OpponentModel, SchedulerConfig};
pub use continuation::{ContinuationError, TrickContinuation};
pub use endgame::{EndgameResult, EndgameSolver};
pub use engine::{CancelToken, Decision, DecisionEngine, DecisionError, DecisionPhase};
pub use player::MonteCarloPlayer;
pub use policy::{HeuristicPolicy, LowestCardPolicy, PublicView, RolloutPolicy};
pub use scheduler::AdaptiveScheduler;
pub use simulation::{SimulationError, SimulationOutcome, SimulationRunner};
pub use stats::CandidateStats;
