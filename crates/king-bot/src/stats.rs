use king_core::model::card::Card;
use std::cmp::Ordering;

/// Aggregated outcomes for one candidate card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStats {
    pub card: Card,
    pub samples: usize,
    pub total: i64,
    pub worst: i32,
    pub best: i32,
}

impl CandidateStats {
    pub fn new(card: Card) -> Self {
        Self {
            card,
            samples: 0,
            total: 0,
            worst: i32::MAX,
            best: i32::MIN,
        }
    }

    pub fn record(&mut self, score: i32) {
        self.samples += 1;
        self.total += i64::from(score);
        self.worst = self.worst.min(score);
        self.best = self.best.max(score);
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn mean(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.total as f64 / self.samples as f64
    }

    /// Ranks two candidates: higher mean wins, then the less severe worst case, then
    /// the lower card (rank first, then suit order). `Greater` means `self` is better.
    pub fn rank_against(&self, other: &Self) -> Ordering {
        let lhs = i128::from(self.total) * other.samples as i128;
        let rhs = i128::from(other.total) * self.samples as i128;
        lhs.cmp(&rhs)
            .then(self.worst.cmp(&other.worst))
            .then(other.card.tie_break_key().cmp(&self.card.tie_break_key()))
    }
}

/// Best candidate with at least one recorded outcome.
pub fn best_candidate(stats: &[CandidateStats]) -> Option<&CandidateStats> {
    stats
        .iter()
        .filter(|s| !s.is_empty())
        .max_by(|a, b| a.rank_against(b))
}
