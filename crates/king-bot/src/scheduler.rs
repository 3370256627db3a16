use crate::config::SchedulerConfig;
use king_core::model::variant::{RoundContext, RoundVariant};
use std::time::Duration;

/// Hand size above which a decision is treated as high-uncertainty.
const LARGE_HAND: usize = 8;
/// Legal-play count above which a decision is treated as wide.
const WIDE_CHOICE: usize = 5;

/// Sizes the Monte Carlo effort of a decision from how uncertain it is.
#[derive(Debug, Clone)]
pub struct AdaptiveScheduler {
    config: SchedulerConfig,
    variant_multiplier: f64,
}

impl AdaptiveScheduler {
    pub fn new(config: &SchedulerConfig, context: &RoundContext) -> Self {
        let variant_multiplier = match context.variant() {
            RoundVariant::King => config.king_multiplier,
            RoundVariant::Festa => config.festa_multiplier,
            RoundVariant::Last => config.last_multiplier,
            _ => 1.0,
        };
        Self {
            config: config.clone(),
            variant_multiplier,
        }
    }

    /// Samples per candidate. Non-decreasing in both arguments and always within
    /// `[floor, ceiling]`.
    pub fn sample_count(&self, remaining_hand_size: usize, num_legal_plays: usize) -> usize {
        let mut count = scale(self.config.base_samples, self.variant_multiplier);
        if remaining_hand_size > LARGE_HAND {
            count = scale(count, self.config.large_hand_multiplier);
        }
        if num_legal_plays > WIDE_CHOICE {
            count = scale(count, self.config.wide_choice_multiplier);
        }
        count.clamp(self.config.floor, self.config.ceiling.max(self.config.floor))
    }

    /// Largest number of rollouts expected to fit in `remaining` at the configured
    /// rollout cost. Never below one.
    pub fn budget_cap(&self, remaining: Duration) -> usize {
        let cost = Duration::from_micros(self.config.rollout_cost_us.max(1));
        let fits = remaining.as_micros() / cost.as_micros();
        usize::try_from(fits).unwrap_or(usize::MAX).max(1)
    }

    /// Per-candidate samples for `candidates` options, trimmed to the budget cap.
    pub fn plan(&self, remaining_hand_size: usize, candidates: usize, remaining: Duration) -> usize {
        let wanted = self.sample_count(remaining_hand_size, candidates);
        let affordable = self.budget_cap(remaining) / candidates.max(1);
        wanted.min(affordable).max(1)
    }
}

/// Multiplies and truncates, never scaling a count down.
fn scale(count: usize, multiplier: f64) -> usize {
    ((count as f64 * multiplier + 1e-9) as usize).max(count)
}

#[cfg(test)]
mod tests {
    use super::AdaptiveScheduler;
    use crate::config::SchedulerConfig;
    use king_core::model::variant::{FestaMode, RoundContext, RoundVariant};
    use std::time::Duration;

    fn scheduler(ctx: RoundContext) -> AdaptiveScheduler {
        AdaptiveScheduler::new(&SchedulerConfig::default(), &ctx)
    }

    #[test]
    fn variant_multipliers_apply() {
        assert_eq!(scheduler(RoundContext::new(RoundVariant::Vazas)).sample_count(5, 2), 100);
        assert_eq!(scheduler(RoundContext::new(RoundVariant::King)).sample_count(5, 2), 200);
        assert_eq!(scheduler(RoundContext::festa(FestaMode::Nulos)).sample_count(5, 2), 150);
        assert_eq!(scheduler(RoundContext::new(RoundVariant::Last)).sample_count(5, 2), 130);
    }

    #[test]
    fn uncertainty_multipliers_stack_and_cap() {
        let vazas = scheduler(RoundContext::new(RoundVariant::Vazas));
        assert_eq!(vazas.sample_count(9, 2), 130);
        assert_eq!(vazas.sample_count(9, 6), 156);
        let king = scheduler(RoundContext::new(RoundVariant::King));
        assert_eq!(king.sample_count(13, 13), 300);
    }

    #[test]
    fn monotone_and_bounded_for_every_variant() {
        let mut contexts: Vec<RoundContext> = RoundVariant::PENALTIES.iter().map(|&v| RoundContext::new(v)).collect();
        contexts.push(RoundContext::festa(FestaMode::Nulos));
        for ctx in contexts {
            let s = scheduler(ctx);
            for hand in 1..=13 {
                for legal in 1..=hand {
                    let n = s.sample_count(hand, legal);
                    assert!((20..=300).contains(&n));
                    assert!(s.sample_count(hand + 1, legal) >= n);
                    assert!(s.sample_count(hand, legal + 1) >= n);
                }
            }
        }
    }

    #[test]
    fn floor_applies_to_tiny_bases() {
        let config = SchedulerConfig {
            base_samples: 3,
            ..SchedulerConfig::default()
        };
        let s = AdaptiveScheduler::new(&config, &RoundContext::new(RoundVariant::Copas));
        assert_eq!(s.sample_count(2, 2), 20);
    }

    #[test]
    fn budget_cap_limits_plan() {
        let s = scheduler(RoundContext::new(RoundVariant::King));
        assert_eq!(s.budget_cap(Duration::from_millis(1)), 40);
        assert_eq!(s.budget_cap(Duration::ZERO), 1);
        assert_eq!(s.plan(10, 4, Duration::from_millis(1)), 10);
        assert_eq!(s.plan(10, 4, Duration::from_secs(5)), s.sample_count(10, 4));
    }
}
