use serde::Deserialize;
use std::time::Duration;

/// How opponents move inside the exhaustive endgame search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentModel {
    /// Perfect-information minimax: opponents minimize the deciding seat's score.
    #[default]
    Adversarial,
    /// Opponents play what the rollout policy would play.
    PolicyFollowing,
}

impl OpponentModel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "adversarial" | "minimax" => Some(OpponentModel::Adversarial),
            "policy" | "policy_following" | "expectimax" => Some(OpponentModel::PolicyFollowing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub base_samples: usize,
    pub floor: usize,
    pub ceiling: usize,
    pub king_multiplier: f64,
    pub festa_multiplier: f64,
    pub last_multiplier: f64,
    pub large_hand_multiplier: f64,
    pub wide_choice_multiplier: f64,
    /// Estimated cost of one rollout, used to fit the latency budget.
    pub rollout_cost_us: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_samples: 100,
            floor: 20,
            ceiling: 300,
            king_multiplier: 2.0,
            festa_multiplier: 1.5,
            last_multiplier: 1.3,
            large_hand_multiplier: 1.3,
            wide_choice_multiplier: 1.2,
            rollout_cost_us: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndgameConfig {
    pub enabled: bool,
    pub max_hand: usize,
    pub max_deals: usize,
    pub node_budget: u64,
    pub opponent_model: OpponentModel,
}

impl Default for EndgameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_hand: 3,
            max_deals: 2_000,
            node_budget: 4_000_000,
            opponent_model: OpponentModel::Adversarial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub endgame: EndgameConfig,
    /// Below this many cards played in the round, the heuristic decides alone.
    pub early_heuristic_cards: usize,
    pub latency_budget_ms: u64,
    pub seed: u64,
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            endgame: EndgameConfig::default(),
            early_heuristic_cards: 4,
            latency_budget_ms: 1_200,
            seed: 0x4b49_4e47,
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }

    fn with_overrides<F>(mut self, mut read: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(samples) = read("KING_MC_SAMPLES").and_then(|raw| raw.trim().parse::<usize>().ok()) {
            self.scheduler.base_samples = samples.max(1);
        }
        if let Some(ceiling) = read("KING_MC_CEILING").and_then(|raw| raw.trim().parse::<usize>().ok()) {
            self.scheduler.ceiling = ceiling.max(self.scheduler.floor);
        }
        if let Some(seed) = read("KING_MC_SEED").and_then(|raw| raw.trim().parse::<u64>().ok()) {
            self.seed = seed;
        }
        if let Some(model) = read("KING_ENDGAME_MODEL").and_then(|raw| OpponentModel::parse(&raw)) {
            self.endgame.opponent_model = model;
        }
        if let Some(ms) = read("KING_LATENCY_MS").and_then(|raw| raw.trim().parse::<u64>().ok()) {
            self.latency_budget_ms = ms;
        }
        if let Some(raw) = read("KING_MC_PARALLEL") {
            self.parallel = matches!(raw.trim(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineConfig, OpponentModel};
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::default().with_overrides(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.scheduler.base_samples, 100);
        assert_eq!(config.scheduler.floor, 20);
        assert_eq!(config.scheduler.ceiling, 300);
        assert_eq!(config.early_heuristic_cards, 4);
        assert_eq!(config.endgame.max_hand, 3);
        assert_eq!(config.endgame.max_deals, 2_000);
        assert_eq!(config.endgame.opponent_model, OpponentModel::Adversarial);
        assert_eq!(config.latency_budget_ms, 1_200);
        assert!(config.parallel);
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let config = overrides(&[
            ("KING_MC_SAMPLES", "40"),
            ("KING_MC_SEED", "99"),
            ("KING_ENDGAME_MODEL", "policy"),
            ("KING_LATENCY_MS", "not-a-number"),
            ("KING_MC_PARALLEL", "off"),
        ]);
        assert_eq!(config.scheduler.base_samples, 40);
        assert_eq!(config.seed, 99);
        assert_eq!(config.endgame.opponent_model, OpponentModel::PolicyFollowing);
        assert_eq!(config.latency_budget_ms, 1_200);
        assert!(!config.parallel);
    }

    #[test]
    fn ceiling_never_drops_below_floor() {
        let config = overrides(&[("KING_MC_CEILING", "5")]);
        assert_eq!(config.scheduler.ceiling, 20);
    }
}
