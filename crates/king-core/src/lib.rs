//! Card model, King rules, per-seat card knowledge and the season driver.

pub mod belief;
pub mod game;
pub mod model;
pub mod rules;
