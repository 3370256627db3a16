use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{Level, event};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

/// Keeps the background writer alive; dropping it flushes the log.
pub struct LoggingGuard {
    _worker: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// With structured logging enabled, routes every `tracing` event as JSON into
/// [`ResolvedOutputs::telemetry_log`]. `RUST_LOG` takes precedence over the configured
/// level.
pub fn init_logging(logging: &LoggingConfig, outputs: &ResolvedOutputs, run_id: &str) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let dir = outputs.telemetry_dir();
    fs::create_dir_all(&dir).with_context(|| format!("creating telemetry directory {}", dir.display()))?;
    let telemetry_path = outputs.telemetry_log();
    let file = File::create(&telemetry_path)
        .with_context(|| format!("creating telemetry log {}", telemetry_path.display()))?;
    let (writer, worker) = NonBlockingBuilder::default().lossy(false).finish(file);

    let level = logging.level().unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NONE)
        .json()
        .with_current_span(false)
        .with_writer(writer)
        .finish();

    // Only the first installed subscriber wins; later runs in one process share it.
    let _ = tracing::subscriber::set_global_default(subscriber);
    event!(target: "king_bench::run", Level::INFO, run_id, "structured logging enabled");

    Ok(Some(LoggingGuard {
        _worker: worker,
        telemetry_path,
    }))
}
