use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{Level, info};
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{BenchmarkConfig, ResolvedOutputs};
use crate::telemetry::RUN_TARGET;

/// Keeps the non-blocking writer alive; dropping it flushes the telemetry log.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// Name of the JSON event log written next to the summary markdown.
pub const TELEMETRY_FILE: &str = "telemetry.jsonl";

pub fn telemetry_dir(outputs: &ResolvedOutputs) -> PathBuf {
    outputs
        .summary_md
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default filter when `RUST_LOG` is unset: the configured level for the
/// treasure crates, warnings only for everything else.
fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,treasure_core={level},treasure_bench={level}")
}

/// Installs the JSON telemetry subscriber and records the run header event.
///
/// Returns `None` when structured logging is disabled in the config.
pub fn init_logging(
    config: &BenchmarkConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<LoggingGuard>> {
    let logging = &config.logging;
    if !logging.enable_structured {
        return Ok(None);
    }

    let telemetry_dir = telemetry_dir(outputs);
    fs::create_dir_all(&telemetry_dir).with_context(|| {
        format!(
            "creating telemetry directory at {}",
            telemetry_dir.display()
        )
    })?;

    let telemetry_path = telemetry_dir.join(TELEMETRY_FILE);
    let file = File::create(&telemetry_path)
        .with_context(|| format!("creating telemetry file at {}", telemetry_path.display()))?;

    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file);

    let level = logging.level().unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // A global subscriber may already exist (tests install their own).
    let _ = tracing::subscriber::set_global_default(subscriber);

    info!(
        target: RUN_TARGET,
        run_id = %config.run_id,
        grid_size = config.hunts.grid_size as u64,
        hunts = config.hunts.count as u64,
        strategies = config.strategies.len() as u64,
        confidence = config.hunts.confidence,
        "benchmark started"
    );

    Ok(Some(LoggingGuard {
        _guard: guard,
        telemetry_path,
    }))
}
