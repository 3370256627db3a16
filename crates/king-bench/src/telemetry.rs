//! Post-run digest of the structured JSON log.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(context: &'static str) -> impl FnOnce(io::Error) -> TelemetryError {
    move |source| TelemetryError::Io { context, source }
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub decisions: DecisionTelemetrySummary,
    pub endgame_solves: usize,
    pub warnings: WarningTelemetrySummary,
}

/// Aggregates of the engine's per-decision events.
#[derive(Debug, Default, Serialize)]
pub struct DecisionTelemetrySummary {
    pub count: usize,
    pub degraded: usize,
    pub avg_samples: Option<f64>,
    pub avg_candidates: Option<f64>,
    pub avg_elapsed_us: Option<f64>,
    pub max_elapsed_us: Option<u64>,
    pub phase_counts: BTreeMap<String, usize>,
    pub variant_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct WarningTelemetrySummary {
    pub count: usize,
    pub message_counts: BTreeMap<String, usize>,
}

/// One line of the `tracing-subscriber` JSON format.
#[derive(Debug, Deserialize)]
struct LogLine {
    #[serde(default)]
    level: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl LogLine {
    fn text(&self, key: &str) -> String {
        match self.fields.get(key).and_then(Value::as_str).map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => "<unset>".to_string(),
        }
    }

    fn number(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    fn is_engine_decision(&self) -> bool {
        self.target == "king_bot::engine" && self.fields.get("message").and_then(Value::as_str) == Some("decision")
    }
}

#[derive(Default)]
struct Running {
    sum: u64,
    count: usize,
}

impl Running {
    fn push(&mut self, value: Option<u64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Default)]
struct Digest {
    summary: TelemetrySummary,
    samples: Running,
    candidates: Running,
    elapsed: Running,
}

impl Digest {
    fn absorb(&mut self, line: &LogLine) {
        if line.level.eq_ignore_ascii_case("warn") && line.target.starts_with("king_bot") {
            let warnings = &mut self.summary.warnings;
            warnings.count += 1;
            *warnings.message_counts.entry(line.text("message")).or_default() += 1;
        } else if line.is_engine_decision() {
            let decisions = &mut self.summary.decisions;
            decisions.count += 1;
            if line.fields.get("degraded").and_then(Value::as_bool) == Some(true) {
                decisions.degraded += 1;
            }
            *decisions.phase_counts.entry(line.text("phase")).or_default() += 1;
            *decisions.variant_counts.entry(line.text("variant")).or_default() += 1;

            let elapsed = line.number("elapsed_us");
            decisions.max_elapsed_us = decisions.max_elapsed_us.max(elapsed);
            self.elapsed.push(elapsed);
            self.samples.push(line.number("samples"));
            self.candidates.push(line.number("candidates"));
        } else if line.target == "king_bot::endgame" {
            self.summary.endgame_solves += 1;
        }
    }

    fn finish(mut self) -> TelemetrySummary {
        self.summary.decisions.avg_samples = self.samples.mean();
        self.summary.decisions.avg_candidates = self.candidates.mean();
        self.summary.decisions.avg_elapsed_us = self.elapsed.mean();
        self.summary
    }
}

/// Summarises the JSON log written by [`crate::logging::init_logging`]. A missing file
/// yields an empty summary.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let reader = BufReader::new(File::open(path).map_err(io_error("opening telemetry log"))?);
    let mut digest = Digest::default();
    for line in reader.lines() {
        let line = line.map_err(io_error("reading telemetry line"))?;
        if line.trim().is_empty() {
            continue;
        }
        digest.absorb(&serde_json::from_str(&line)?);
    }
    Ok(digest.finish())
}

/// Writes `telemetry_summary.json` and `telemetry_summary.md` into `output_dir`.
pub fn write_summary_outputs(telemetry_path: &Path, output_dir: &Path) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let markdown_path = output_dir.join("telemetry_summary.md");

    fs::write(&json_path, serde_json::to_vec_pretty(&summary)?).map_err(io_error("writing telemetry summary json"))?;
    fs::write(&markdown_path, render_markdown(&summary, telemetry_path))
        .map_err(io_error("writing telemetry summary markdown"))?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path,
    }))
}

pub fn append_highlights_to_markdown(summary_path: &Path, outputs: &TelemetryOutputs) -> Result<(), TelemetryError> {
    let mut section = String::from("\n## Telemetry Highlights\n");
    decision_lines(&mut section, &outputs.summary);
    if outputs.summary.warnings.count > 0 {
        let _ = writeln!(section, "- Engine warnings: {}", outputs.summary.warnings.count);
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .and_then(|mut file| file.write_all(section.as_bytes()))
        .map_err(io_error("appending telemetry highlights"))
}

fn decision_lines(out: &mut String, summary: &TelemetrySummary) {
    let decisions = &summary.decisions;
    let _ = writeln!(out, "- Engine decisions logged: {}", decisions.count);
    let _ = writeln!(out, "- Degraded decisions: {}", decisions.degraded);
    if let Some(samples) = decisions.avg_samples {
        let _ = writeln!(out, "- Avg samples per decision: {samples:.1}");
    }
    if let Some(us) = decisions.avg_elapsed_us {
        let _ = writeln!(out, "- Avg decision time: {:.2} ms", us / 1000.0);
    }
    if let Some(us) = decisions.max_elapsed_us {
        let _ = writeln!(out, "- Slowest decision: {:.2} ms", us as f64 / 1000.0);
    }
    let _ = writeln!(out, "- Endgame solves: {}", summary.endgame_solves);
    if !decisions.phase_counts.is_empty() {
        out.push_str("- Phases:\n");
        for (phase, count) in &decisions.phase_counts {
            let _ = writeln!(out, "  - {phase}: {count}");
        }
    }
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut out = String::from("# Telemetry Summary\n\n");
    let _ = writeln!(out, "- Source: `{}`\n", telemetry_path.display());

    out.push_str("## Engine Decisions\n");
    decision_lines(&mut out, summary);
    if let Some(candidates) = summary.decisions.avg_candidates {
        let _ = writeln!(out, "- Avg candidates: {candidates:.2}");
    }
    if !summary.decisions.variant_counts.is_empty() {
        out.push_str("- By variant:\n");
        for (variant, count) in &summary.decisions.variant_counts {
            let _ = writeln!(out, "  - {variant}: {count}");
        }
    }

    out.push_str("\n## Warnings\n");
    if summary.warnings.message_counts.is_empty() {
        out.push_str("- <none>\n");
    }
    for (message, count) in &summary.warnings.message_counts {
        let _ = writeln!(out, "- {message}: {count}");
    }
    out
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}
