use crate::model::deck::DECK_SIZE;
use crate::model::player::PlayerPosition;
use crate::model::suit::Suit;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Scoring rule in force for one round of a King season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundVariant {
    Vazas,
    Copas,
    Homens,
    Mulheres,
    King,
    Last,
    Festa,
}

impl RoundVariant {
    pub const PENALTIES: [RoundVariant; 6] = [
        RoundVariant::Vazas,
        RoundVariant::Copas,
        RoundVariant::Homens,
        RoundVariant::Mulheres,
        RoundVariant::King,
        RoundVariant::Last,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RoundVariant::Vazas => "vazas",
            RoundVariant::Copas => "copas",
            RoundVariant::Homens => "homens",
            RoundVariant::Mulheres => "mulheres",
            RoundVariant::King => "king",
            RoundVariant::Last => "last",
            RoundVariant::Festa => "festa",
        }
    }
}

impl fmt::Display for RoundVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundVariant {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim().to_ascii_lowercase().as_str() {
            "vazas" => Ok(RoundVariant::Vazas),
            "copas" => Ok(RoundVariant::Copas),
            "homens" => Ok(RoundVariant::Homens),
            "mulheres" => Ok(RoundVariant::Mulheres),
            "king" => Ok(RoundVariant::King),
            "last" => Ok(RoundVariant::Last),
            "festa" => Ok(RoundVariant::Festa),
            other => Err(format!("unknown round variant '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum FestaMode {
    /// Avoid tricks.
    Nulos,
    /// Win tricks; `trump` outranks every other suit.
    Positivos { trump: Suit },
}

/// Everything about the round the rules and the engine need besides the cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundContext {
    variant: RoundVariant,
    festa: Option<FestaMode>,
    scores: [i32; 4],
    deck_size: usize,
}

impl RoundContext {
    pub fn new(variant: RoundVariant) -> Self {
        let festa = match variant {
            RoundVariant::Festa => Some(FestaMode::Nulos),
            _ => None,
        };
        Self {
            variant,
            festa,
            scores: [0; 4],
            deck_size: DECK_SIZE,
        }
    }

    pub fn festa(mode: FestaMode) -> Self {
        Self {
            festa: Some(mode),
            ..Self::new(RoundVariant::Festa)
        }
    }

    pub fn with_scores(mut self, scores: [i32; 4]) -> Self {
        self.scores = scores;
        self
    }

    pub fn variant(&self) -> RoundVariant {
        self.variant
    }

    pub fn festa_mode(&self) -> Option<FestaMode> {
        self.festa
    }

    /// Trump suit, present only for positivos Festa.
    pub fn trump(&self) -> Option<Suit> {
        match self.festa {
            Some(FestaMode::Positivos { trump }) => Some(trump),
            _ => None,
        }
    }

    /// True when winning tricks is desirable this round.
    pub fn rewards_tricks(&self) -> bool {
        matches!(self.festa, Some(FestaMode::Positivos { .. }))
    }

    pub fn score(&self, seat: PlayerPosition) -> i32 {
        self.scores[seat.index()]
    }

    pub fn scores(&self) -> &[i32; 4] {
        &self.scores
    }

    pub fn record_points(&mut self, points: [i32; 4]) {
        for (total, delta) in self.scores.iter_mut().zip(points) {
            *total += delta;
        }
    }

    pub fn deck_size(&self) -> usize {
        self.deck_size
    }
}
