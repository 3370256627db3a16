mod season;

pub use season::{RoundResult, Season};
