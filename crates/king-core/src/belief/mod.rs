//! Knowledge about hidden hands and sampling of consistent deals.
//!
//! - `tracker`: hard facts inferred from observed play (`CardKnowledgeTracker`).
//! - `sampler`: exact uniform deal sampling over those facts (`HandSampler`).

mod sampler;
mod tracker;

pub use sampler::{HandSampler, Infeasibility, SampledDeal, SamplingError};
pub use tracker::{
    CardKnowledgeTracker, Constraint, ConstraintKind, KnowledgeSnapshot, TrackingError,
};
