//! Per-agent statistics over a run and the Markdown summary table.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind, ArenaConfig};
use crate::tournament::{DecisionSummary, RoundOutcome};

/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.96;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("baseline agent '{0}' not present in arena results")]
    MissingBaseline(String),
    #[error("agent '{0}' defined in results but missing from configuration")]
    UnknownAgent(String),
    #[error("baseline '{0}' missing for deal {1}")]
    MissingBaselineDeal(String, String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Collects round results per agent. King points: higher is better.
pub struct AnalyticsCollector {
    baseline: String,
    latency_budget_ms: u64,
    /// Configuration order; reports keep it.
    slots: Vec<AgentSlot>,
    index: HashMap<String, usize>,
    /// Variant label to per-slot means.
    by_variant: BTreeMap<String, Vec<Mean>>,
}

impl AnalyticsCollector {
    pub fn new(config: &ArenaConfig) -> Result<Self, AnalyticsError> {
        let Some(baseline) = config.metrics.baseline.clone() else {
            return Err(AnalyticsError::MissingBaseline("<unset>".into()));
        };
        let slots: Vec<AgentSlot> = config.agents.iter().cloned().map(AgentSlot::new).collect();
        let index = slots
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.config.name.clone(), position))
            .collect();
        Ok(Self {
            baseline,
            latency_budget_ms: config.metrics.latency_budget_ms,
            slots,
            index,
            by_variant: BTreeMap::new(),
        })
    }

    pub fn record_round(&mut self, deal_id: &str, outcome: &RoundOutcome) -> Result<(), AnalyticsError> {
        let seats = &outcome.seat_results;
        let Some(baseline) = seats.iter().find(|seat| seat.agent_name == self.baseline) else {
            return Err(AnalyticsError::MissingBaselineDeal(self.baseline.clone(), deal_id.to_string()));
        };
        let baseline_points = f64::from(baseline.points);
        let best = seats.iter().map(|seat| seat.points).max().unwrap_or(0);
        let agents = self.slots.len();
        let variant_means = self
            .by_variant
            .entry(outcome.variant.clone())
            .or_insert_with(|| vec![Mean::default(); agents]);

        for seat in seats {
            let Some(&position) = self.index.get(&seat.agent_name) else {
                return Err(AnalyticsError::UnknownAgent(seat.agent_name.clone()));
            };
            let points = f64::from(seat.points);
            let slot = &mut self.slots[position];
            slot.record(points, seat.points == best, &seat.metrics);
            if seat.agent_name != self.baseline {
                slot.paired_diffs.push(points - baseline_points);
            }
            variant_means[position].add(points);
        }
        Ok(())
    }

    pub fn finalize(self) -> Result<AnalyticsSummary, AnalyticsError> {
        let Some(&baseline_position) = self.index.get(&self.baseline) else {
            return Err(AnalyticsError::MissingBaseline(self.baseline));
        };
        let baseline_avg = self.slots[baseline_position].mean();

        let mut agents = Vec::with_capacity(self.slots.len());
        let mut comparisons = Vec::with_capacity(self.slots.len());
        for (position, slot) in self.slots.into_iter().enumerate() {
            let (p_value, sample_size) = if position == baseline_position {
                (1.0, slot.points.len())
            } else {
                wilcoxon_signed_rank(&slot.paired_diffs)
            };
            comparisons.push(ComparisonReport {
                agent: slot.config.name.clone(),
                p_value,
                sample_size,
            });
            agents.push(slot.into_report(baseline_avg, self.latency_budget_ms));
        }

        let by_variant = self
            .by_variant
            .into_iter()
            .map(|(variant, means)| VariantReport {
                variant,
                means: means.iter().map(Mean::value).collect(),
            })
            .collect();

        Ok(AnalyticsSummary {
            baseline: self.baseline,
            agents,
            comparisons,
            by_variant,
            latency_budget_ms: self.latency_budget_ms,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

struct AgentSlot {
    config: AgentConfig,
    points: Vec<f64>,
    /// Own points minus the baseline's, per shared round.
    paired_diffs: Vec<f64>,
    wins: usize,
    latency_ms: f64,
    decisions: u64,
    degraded: u64,
}

impl AgentSlot {
    fn new(config: AgentConfig) -> Self {
        Self {
            config,
            points: Vec::new(),
            paired_diffs: Vec::new(),
            wins: 0,
            latency_ms: 0.0,
            decisions: 0,
            degraded: 0,
        }
    }

    fn record(&mut self, points: f64, won: bool, metrics: &DecisionSummary) {
        self.points.push(points);
        self.wins += usize::from(won);
        self.latency_ms += metrics.total_ms;
        self.decisions += u64::from(metrics.decisions);
        self.degraded += u64::from(metrics.degraded);
    }

    fn mean(&self) -> f64 {
        if self.points.is_empty() {
            0.0
        } else {
            self.points.iter().sum::<f64>() / self.points.len() as f64
        }
    }

    fn into_report(self, baseline_avg: f64, latency_budget_ms: u64) -> AgentReport {
        let avg_points = self.mean();
        let average_ms_per_decision = if self.decisions == 0 {
            0.0
        } else {
            self.latency_ms / self.decisions as f64
        };
        AgentReport {
            rounds: self.points.len(),
            total_points: self.points.iter().sum(),
            avg_points,
            ci95: confidence_interval(&self.points),
            wins: self.wins,
            degraded_decisions: self.degraded,
            average_ms_per_decision,
            delta_vs_baseline: avg_points - baseline_avg,
            over_budget: average_ms_per_decision > latency_budget_ms as f64,
            name: self.config.name,
            kind: self.config.kind,
            params: self.config.params,
        }
    }
}

/// Two-sided Wilcoxon signed-rank test on paired differences, using the normal
/// approximation with tie and continuity corrections. Zero differences are dropped.
/// Returns the p-value and the number of pairs that counted.
fn wilcoxon_signed_rank(diffs: &[f64]) -> (f64, usize) {
    let mut nonzero: Vec<f64> = diffs.iter().copied().filter(|d| d.abs() > f64::EPSILON).collect();
    let n = nonzero.len();
    if n == 0 {
        return (1.0, 0);
    }
    nonzero.sort_by(|a, b| a.abs().total_cmp(&b.abs()));

    let mut positive_rank_sum = 0.0;
    let mut tie_correction = 0.0;
    let mut below = 0usize;
    for group in nonzero.chunk_by(|a, b| (a.abs() - b.abs()).abs() < 1e-12) {
        let size = group.len() as f64;
        // Tied magnitudes share the average of ranks below+1 ..= below+len.
        let rank = below as f64 + (size + 1.0) / 2.0;
        positive_rank_sum += rank * group.iter().filter(|d| **d > 0.0).count() as f64;
        tie_correction += (size.powi(3) - size) / 48.0;
        below += group.len();
    }

    let n = n as f64;
    let total = n * (n + 1.0) / 2.0;
    let statistic = positive_rank_sum.min(total - positive_rank_sum);
    let expected = total / 2.0;
    let variance = n * (n + 1.0) * (2.0 * n + 1.0) / 24.0 - tie_correction;
    let pairs = n as usize;
    if variance <= 0.0 {
        return (1.0, pairs);
    }
    let z = (((statistic - expected).abs() - 0.5) / variance.sqrt()).max(0.0);
    match Normal::new(0.0, 1.0) {
        Ok(normal) => ((2.0 * (1.0 - normal.cdf(z))).clamp(0.0, 1.0), pairs),
        Err(_) => (1.0, pairs),
    }
}

fn confidence_interval(points: &[f64]) -> (f64, f64) {
    let n = points.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = points.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, mean);
    }
    let sample_variance = points.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let margin = Z_95 * (sample_variance / n as f64).sqrt();
    (mean - margin, mean + margin)
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub baseline: String,
    pub agents: Vec<AgentReport>,
    pub comparisons: Vec<ComparisonReport>,
    pub by_variant: Vec<VariantReport>,
    pub latency_budget_ms: u64,
}

impl AnalyticsSummary {
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_tables(&mut out);
        out
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        fs::write(path.as_ref(), self.render_markdown()).map_err(|source| AnalyticsError::Io {
            context: "writing summary markdown",
            source,
        })
    }

    fn p_value(&self, agent: &str) -> f64 {
        self.comparisons
            .iter()
            .find(|comparison| comparison.agent == agent)
            .map_or(1.0, |comparison| comparison.p_value)
    }

    fn write_tables(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# Arena Summary\n")?;
        writeln!(out, "Baseline: `{}`\n", self.baseline)?;
        writeln!(out, "Latency budget: {} ms average per decision\n", self.latency_budget_ms)?;
        writeln!(
            out,
            "| Agent | Kind | Rounds | Avg points | Δ vs baseline | 95% CI | Round wins % | Avg ms/decision | Degraded | Over Budget | p-value |"
        )?;
        writeln!(out, "|{}", "---|".repeat(11))?;
        for agent in &self.agents {
            let win_pct = if agent.rounds == 0 {
                0.0
            } else {
                100.0 * agent.wins as f64 / agent.rounds as f64
            };
            writeln!(
                out,
                "| {} | {:?} | {} | {:.2} | {:+.2} | [{:.2}, {:.2}] | {:.1}% | {:.2} | {} | {} | {:.3} |",
                agent.name,
                agent.kind,
                agent.rounds,
                agent.avg_points,
                agent.delta_vs_baseline,
                agent.ci95.0,
                agent.ci95.1,
                win_pct,
                agent.average_ms_per_decision,
                agent.degraded_decisions,
                if agent.over_budget { "Yes" } else { "No" },
                self.p_value(&agent.name),
            )?;
        }

        if self.by_variant.is_empty() {
            return Ok(());
        }
        write!(out, "\n## Mean points by variant\n\n| Variant |")?;
        for agent in &self.agents {
            write!(out, " {} |", agent.name)?;
        }
        writeln!(out, "\n|{}", "---|".repeat(self.agents.len() + 1))?;
        for row in &self.by_variant {
            write!(out, "| {} |", row.variant)?;
            for mean in &row.means {
                match mean {
                    Some(value) => write!(out, " {value:.2} |")?,
                    None => write!(out, " - |")?,
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub name: String,
    pub kind: AgentKind,
    pub params: serde_yaml::Value,
    pub rounds: usize,
    pub total_points: f64,
    pub avg_points: f64,
    pub ci95: (f64, f64),
    pub wins: usize,
    pub degraded_decisions: u64,
    pub average_ms_per_decision: f64,
    pub delta_vs_baseline: f64,
    #[serde(skip)]
    pub over_budget: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub agent: String,
    pub p_value: f64,
    pub sample_size: usize,
}

/// Mean points per agent for one round variant, in agent configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
    pub variant: String,
    pub means: Vec<Option<f64>>,
}
