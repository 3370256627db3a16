use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use king_bench::config::ArenaConfig;
use king_bench::logging::init_logging;
use king_bench::tournament::{RunSummary, TournamentRunner};

/// Plays seeded King seasons between configured agents.
#[derive(Debug, Parser)]
#[command(name = "king-bench", author, version, about = "Seeded King arena")]
struct Cli {
    /// Arena configuration (YAML).
    #[arg(short, long, value_name = "FILE", default_value = "bench/arena.yaml")]
    config: PathBuf,

    /// Replaces `run_id`, and with it every `{run_id}` in the output paths.
    #[arg(long)]
    run_id: Option<String>,

    /// Seasons to play.
    #[arg(long)]
    hands: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Seatings per season, 1 to 24.
    #[arg(long)]
    permutations: Option<usize>,

    /// Comma-separated round list, e.g. `vazas,king,festa:positivos:spades`.
    #[arg(long, value_delimiter = ',')]
    variants: Option<Vec<String>>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    validate_only: bool,
}

impl Cli {
    fn apply(&mut self, config: &mut ArenaConfig) {
        if let Some(run_id) = self.run_id.take() {
            config.run_id = run_id;
        }
        if let Some(variants) = self.variants.take() {
            config.variants = variants;
        }
        config.deals.hands = self.hands.unwrap_or(config.deals.hands);
        config.deals.permutations = self.permutations.unwrap_or(config.deals.permutations);
        config.deals.seed = self.seed.or(config.deals.seed);
    }
}

fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let mut config = ArenaConfig::from_path(&cli.config)?;
    cli.apply(&mut config);
    config
        .validate()
        .with_context(|| format!("after command-line overrides to {}", cli.config.display()))?;

    let outputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    println!(
        "{run_id}: {} agents, {} seasons x {} seatings",
        config.agents.len(),
        config.deals.hands,
        config.deals.permutations
    );

    let _guard = init_logging(&config.logging, &outputs, &run_id)?;
    let runner = TournamentRunner::new(config, outputs)?;
    if cli.validate_only {
        println!("configuration ok; nothing played");
        return Ok(());
    }

    report(&runner.run()?);
    Ok(())
}

fn report(summary: &RunSummary) {
    println!(
        "{} rows ({} seasons x {} seatings x {} rounds) -> {}",
        summary.rows_written,
        summary.hands_played,
        summary.permutations,
        summary.rounds_per_season,
        summary.jsonl_path.display()
    );
    println!("summary: {}", summary.summary_path.display());
    if let Some(path) = &summary.telemetry_path {
        println!("telemetry log: {}", path.display());
    }
    let Some(telemetry) = &summary.telemetry_outputs else {
        return;
    };
    println!(
        "telemetry digest: {} / {}",
        telemetry.json_path.display(),
        telemetry.markdown_path.display()
    );
    let decisions = &telemetry.summary.decisions;
    println!("engine decisions: {} ({} degraded)", decisions.count, decisions.degraded);
    for (phase, count) in &decisions.phase_counts {
        println!("  {phase}: {count}");
    }
}
