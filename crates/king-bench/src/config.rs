//! YAML schema of an arena run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use king_bot::EngineConfig;
use king_core::game::Season;
use king_core::model::suit::Suit;
use king_core::model::variant::{FestaMode, RoundContext, RoundVariant};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::tournament::SeatPermutations;

/// Seatings per season when `deals.permutations` is omitted: the four rotations.
const ROTATIONS: usize = 4;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ArenaConfig {
    pub run_id: String,
    pub deals: DealConfig,
    /// Round variants of one season, in play order. Empty means the standard season.
    #[serde(default)]
    pub variants: Vec<String>,
    pub agents: Vec<AgentConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ArenaConfig {
    /// Reads, parses and validates `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        let mut config: ArenaConfig = match serde_yaml::from_str(&text) {
            Ok(config) => config,
            Err(source) => return Err(ConfigError::Parse { path, source }),
        };
        match config.validate() {
            Ok(()) => Ok(config),
            Err(source) => Err(ConfigError::Invalid { path, source }),
        }
    }

    /// Checks every block and fills in a blank tracing level. Touches no files.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        check_identifier("run_id", &self.run_id)?;
        self.deals.validate()?;
        self.schedule()?;
        self.outputs.validate(&self.run_id)?;
        self.metrics.validate(&self.agents)?;
        if self.logging.tracing_level.trim().is_empty() {
            self.logging.tracing_level = LoggingConfig::default().tracing_level;
        }
        validate_agents(&self.agents)
    }

    /// Round contexts for one season, parsed from `variants`.
    pub fn schedule(&self) -> Result<Vec<RoundContext>, ValidationError> {
        if self.variants.is_empty() {
            return Ok(Season::standard_schedule());
        }
        let mut schedule = Vec::with_capacity(self.variants.len());
        for (index, raw) in self.variants.iter().enumerate() {
            let context =
                parse_round(raw).map_err(|message| ValidationError::invalid(format!("variants[{index}]"), message))?;
            schedule.push(context);
        }
        Ok(schedule)
    }

    /// Output paths with every `{run_id}` substituted.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        let resolve = |template: &str| PathBuf::from(template.replace("{run_id}", &self.run_id));
        ResolvedOutputs {
            jsonl: resolve(&self.outputs.jsonl),
            summary_md: resolve(&self.outputs.summary_md),
        }
    }
}

/// Parses `vazas`, `festa`, `festa:nulos` or `festa:positivos:<suit>`.
pub fn parse_round(raw: &str) -> Result<RoundContext, String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let mut parts = lowered.split(':');
    let variant: RoundVariant = parts.next().unwrap_or_default().parse()?;
    let context = match (variant, parts.next(), parts.next()) {
        (RoundVariant::Festa, None | Some("nulos"), None) => RoundContext::festa(FestaMode::Nulos),
        (RoundVariant::Festa, Some("positivos"), Some(suit)) => RoundContext::festa(FestaMode::Positivos {
            trump: parse_suit(suit)?,
        }),
        (RoundVariant::Festa, Some("positivos"), None) => {
            return Err("positivos festa needs a trump suit, e.g. 'festa:positivos:spades'".to_string());
        }
        (RoundVariant::Festa, Some(mode), _) => return Err(format!("unknown festa mode '{mode}'")),
        (variant, None, _) => RoundContext::new(variant),
        (variant, Some(_), _) => return Err(format!("variant '{variant}' takes no options")),
    };
    if parts.next().is_some() {
        return Err(format!("unexpected trailing options in '{raw}'"));
    }
    Ok(context)
}

/// Inverse of [`parse_round`], used to label output rows.
pub fn round_label(context: &RoundContext) -> String {
    match context.festa_mode() {
        Some(FestaMode::Nulos) => "festa:nulos".to_string(),
        Some(FestaMode::Positivos { trump }) => format!("festa:positivos:{}", suit_name(trump)),
        None => context.variant().to_string(),
    }
}

fn suit_name(suit: Suit) -> &'static str {
    match suit {
        Suit::Clubs => "clubs",
        Suit::Diamonds => "diamonds",
        Suit::Spades => "spades",
        Suit::Hearts => "hearts",
    }
}

fn parse_suit(raw: &str) -> Result<Suit, String> {
    if let Some(suit) = Suit::ALL.into_iter().find(|&suit| suit_name(suit) == raw) {
        return Ok(suit);
    }
    let mut chars = raw.chars();
    match (chars.next().and_then(Suit::from_char), chars.next()) {
        (Some(suit), None) => Ok(suit),
        _ => Err(format!("unknown trump suit '{raw}'")),
    }
}

/// Each of the `hands` seasons is dealt from its own seed and replayed under every
/// seat permutation.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DealConfig {
    pub seed: Option<u64>,
    pub hands: usize,
    #[serde(default = "rotations")]
    pub permutations: usize,
}

fn rotations() -> usize {
    ROTATIONS
}

impl DealConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.hands == 0 {
            return Err(ValidationError::invalid("deals.hands", "at least one hand is required"));
        }
        if !(1..=SeatPermutations::MAX).contains(&self.permutations) {
            return Err(ValidationError::invalid(
                "deals.permutations",
                format!("expected 1..={}, got {}", SeatPermutations::MAX, self.permutations),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    /// Engine overrides for `monte_carlo` agents, in [`EngineConfig`] shape.
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl AgentConfig {
    /// Engine settings for a `monte_carlo` agent: `params` over the defaults, then any
    /// `KING_*` environment overrides.
    pub fn engine_config(&self) -> Result<EngineConfig, ValidationError> {
        let config = match &self.params {
            serde_yaml::Value::Null => EngineConfig::default(),
            params => serde_yaml::from_value::<EngineConfig>(params.clone())
                .map_err(|err| ValidationError::invalid(format!("agents[{}].params", self.name), err.to_string()))?,
        };
        Ok(config.with_env_overrides())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Heuristic,
    Lowest,
    MonteCarlo,
}

/// Output path templates; `{run_id}` is substituted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (field, template) in [("outputs.jsonl", &self.jsonl), ("outputs.summary_md", &self.summary_md)] {
            let resolved = template.trim().replace("{run_id}", run_id);
            if resolved.is_empty() || Path::new(&resolved).file_name().is_none() {
                return Err(ValidationError::invalid(field, format!("'{template}' does not name a file")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Agent every other agent is compared against.
    pub baseline: Option<String>,
    /// Mean per-decision latency above which an agent is reported over budget.
    pub latency_budget_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            baseline: None,
            latency_budget_ms: EngineConfig::default().latency_budget_ms,
        }
    }
}

impl MetricsConfig {
    fn validate(&self, agents: &[AgentConfig]) -> Result<(), ValidationError> {
        match &self.baseline {
            None => return Err(ValidationError::invalid("metrics.baseline", "a baseline agent is required")),
            Some(name) if agents.iter().all(|agent| &agent.name != name) => {
                return Err(ValidationError::invalid(
                    "metrics.baseline",
                    format!("'{name}' is not one of the configured agents"),
                ));
            }
            Some(_) => {}
        }
        if self.latency_budget_ms == 0 {
            return Err(ValidationError::invalid("metrics.latency_budget_ms", "must be positive"));
        }
        Ok(())
    }
}

/// Structured JSON logging is off unless enabled.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enable_structured: bool,
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// `None` for anything `tracing` does not recognise.
    pub fn level(&self) -> Option<Level> {
        self.tracing_level.trim().parse().ok()
    }
}

/// Run ids and agent names end up in paths and Markdown tables.
fn check_identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::invalid(field, "must not be empty"));
    }
    match value
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        Some(bad) => Err(ValidationError::invalid(
            field,
            format!("'{value}' contains '{bad}'; use letters, digits, '.', '_' or '-'"),
        )),
        None => Ok(()),
    }
}

fn validate_agents(agents: &[AgentConfig]) -> Result<(), ValidationError> {
    if agents.is_empty() {
        return Err(ValidationError::invalid("agents", "no agents configured"));
    }
    let mut names = HashSet::with_capacity(agents.len());
    for agent in agents {
        check_identifier(&format!("agents[{}].name", agent.name), &agent.name)?;
        if !names.insert(agent.name.as_str()) {
            return Err(ValidationError::invalid("agents", format!("'{}' appears twice", agent.name)));
        }
        if agent.kind == AgentKind::MonteCarlo {
            agent.engine_config()?;
        }
    }
    Ok(())
}

/// Output paths of a run after template substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

impl ResolvedOutputs {
    /// Directory holding the summary; structured logs and their digests go here too.
    pub fn telemetry_dir(&self) -> PathBuf {
        match self.summary_md.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn telemetry_log(&self) -> PathBuf {
        self.telemetry_dir().join("telemetry.jsonl")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("{} is not a valid arena config: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_yaml::Error },
    #[error("{}: {source}", .path.display())]
    Invalid { path: PathBuf, source: ValidationError },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        let (ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } | ConfigError::Invalid { path, .. }) = self;
        path
    }
}

/// A config value that failed validation, named by its YAML path.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },
}

impl ValidationError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn field(&self) -> &str {
        let ValidationError::InvalidField { field, .. } = self;
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use king_bot::OpponentModel;

    const SEASON_YAML: &str = r#"
run_id: "season_smoke"
deals:
  seed: 123
  hands: 2
variants: ["vazas", "copas", "festa:positivos:hearts"]
agents:
  - name: "heuristic"
    kind: "heuristic"
  - name: "lowest"
    kind: "lowest"
  - name: "mc"
    kind: "monte_carlo"
    params:
      seed: 7
      parallel: false
      scheduler:
        base_samples: 24
      endgame:
        opponent_model: "policy_following"
outputs:
  jsonl: "bench/out/{run_id}/deals.jsonl"
  summary_md: "bench/out/{run_id}/summary.md"
metrics:
  baseline: "heuristic"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    fn parsed(yaml: &str) -> ArenaConfig {
        serde_yaml::from_str(yaml).expect("yaml parses")
    }

    fn failing_field(yaml: &str) -> String {
        let mut config = parsed(yaml);
        config.validate().expect_err("validation fails").field().to_string()
    }

    #[test]
    fn season_config_validates_with_defaults() {
        let mut config = parsed(SEASON_YAML);
        config.validate().expect("valid");

        assert_eq!(config.deals.permutations, 4);
        assert_eq!(config.metrics.latency_budget_ms, 1_200);
        assert_eq!(config.logging.level(), Some(Level::DEBUG));

        let outputs = config.resolved_outputs();
        assert_eq!(outputs.jsonl, PathBuf::from("bench/out/season_smoke/deals.jsonl"));
        assert_eq!(outputs.telemetry_log(), PathBuf::from("bench/out/season_smoke/telemetry.jsonl"));
    }

    #[test]
    fn monte_carlo_params_override_engine_defaults() {
        let config = parsed(SEASON_YAML);
        let engine = config.agents[2].engine_config().expect("engine config");
        assert_eq!(engine.scheduler.base_samples, 24);
        assert_eq!(engine.endgame.opponent_model, OpponentModel::PolicyFollowing);
        assert_eq!(engine.endgame.max_hand, EngineConfig::default().endgame.max_hand);
        assert!(config.agents[0].engine_config().is_ok());
    }

    #[test]
    fn schedule_parses_variants_and_festa_modes() {
        let schedule = parsed(SEASON_YAML).schedule().expect("schedule");
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule[1].variant(), RoundVariant::Copas);
        assert_eq!(schedule[2].trump(), Some(Suit::Hearts));
    }

    #[test]
    fn empty_variants_mean_the_standard_season() {
        let yaml = SEASON_YAML.replace("variants: [\"vazas\", \"copas\", \"festa:positivos:hearts\"]\n", "");
        assert_eq!(parsed(&yaml).schedule().expect("schedule"), Season::standard_schedule());
    }

    #[test]
    fn parse_round_accepts_short_suits_and_rejects_junk() {
        assert_eq!(parse_round("Festa:Positivos:S").unwrap().trump(), Some(Suit::Spades));
        assert_eq!(parse_round("festa").unwrap().festa_mode(), Some(FestaMode::Nulos));
        assert!(parse_round("festa:positivos").is_err());
        assert!(parse_round("festa:positivos:spades:extra").is_err());
        assert!(parse_round("king:hearts").is_err());
        assert!(parse_round("poker").is_err());
    }

    #[test]
    fn round_labels_parse_back() {
        for context in [
            RoundContext::new(RoundVariant::Homens),
            RoundContext::festa(FestaMode::Nulos),
            RoundContext::festa(FestaMode::Positivos { trump: Suit::Diamonds }),
        ] {
            assert_eq!(parse_round(&round_label(&context)).unwrap(), context);
        }
    }

    #[test]
    fn validation_names_the_offending_field() {
        assert_eq!(failing_field(&SEASON_YAML.replace("\"copas\"", "\"copa\"")), "variants[1]");
        assert_eq!(
            failing_field(&SEASON_YAML.replace("baseline: \"heuristic\"", "latency_budget_ms: 900")),
            "metrics.baseline"
        );
        assert_eq!(
            failing_field(&SEASON_YAML.replace("baseline: \"heuristic\"", "baseline: \"nobody\"")),
            "metrics.baseline"
        );
        assert_eq!(
            failing_field(&SEASON_YAML.replace("- name: \"lowest\"", "- name: \"heuristic\"")),
            "agents"
        );
        assert_eq!(
            failing_field(&SEASON_YAML.replace("base_samples: 24", "base_samples: \"many\"")),
            "agents[mc].params"
        );
        assert_eq!(failing_field(&SEASON_YAML.replace("season_smoke", "season smoke")), "run_id");
        assert_eq!(failing_field(&SEASON_YAML.replace("hands: 2", "hands: 0")), "deals.hands");
        assert_eq!(
            failing_field(&SEASON_YAML.replace("hands: 2", "hands: 2\n  permutations: 25")),
            "deals.permutations"
        );
    }

    #[test]
    fn outputs_resolve_every_template_occurrence() {
        let yaml = SEASON_YAML.replace("bench/out/{run_id}/summary.md", "bench/out/{run_id}/{run_id}/summary.md");
        let mut config = parsed(&yaml);
        config.validate().expect("valid");
        assert_eq!(
            config.resolved_outputs().summary_md,
            PathBuf::from("bench/out/season_smoke/season_smoke/summary.md")
        );
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = ArenaConfig::from_path("does/not/exist.yaml").expect_err("missing file");
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(err.path(), Path::new("does/not/exist.yaml"));
    }
}
