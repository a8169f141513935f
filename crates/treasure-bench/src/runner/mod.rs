mod schedule;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};
use treasure_core::grid::Cell;
use treasure_core::hunt::{Hunt, HuntError, HuntLimits, HuntOutcome, StopReason};

use crate::analytics::{AnalyticsCollector, AnalyticsError, hunt_id};
use crate::config::{BenchmarkConfig, ResolvedOutputs, StrategyConfig};
use crate::logging::{TELEMETRY_FILE, telemetry_dir};
use crate::telemetry::{
    HUNT_TARGET, TelemetryError, TelemetryOutputs, append_highlights_to_markdown,
    write_summary_outputs,
};

use schedule::HuntSchedule;

/// Plays every configured strategy against the same seeded hunts.
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    schedule: HuntSchedule,
    limits: HuntLimits,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub hunts_played: usize,
    pub strategies: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_path: Option<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
}

/// Result of one strategy on one hunt.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub outcome: HuntOutcome,
    pub elapsed_ms: f64,
}

impl BenchmarkRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        if config.strategies.is_empty() {
            return Err(RunnerError::NoStrategies);
        }

        let schedule = HuntSchedule::new(config.hunts.seed.unwrap_or(0), config.hunts.count);
        let limits = config.hunts.limits();

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            schedule,
            limits,
        })
    }

    /// Execute the benchmark, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        if !self.outputs.plots_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.outputs.plots_dir)?;
        }

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rows_written = 0usize;
        let mut analytics = AnalyticsCollector::new(&self.config)?;

        for (hunt_index, hunt_seed) in self.schedule.iter() {
            let outcomes = self.play_hunt(hunt_index, hunt_seed)?;
            analytics.record_hunt(hunt_index, &outcomes)?;
            rows_written += write_hunt_rows(
                &mut writer,
                &self.config,
                hunt_index,
                hunt_seed,
                &outcomes,
            )?;
        }

        writer.flush()?;

        let summary = analytics.finalize()?;
        summary.write_markdown(&self.outputs.summary_md)?;
        let plot_path = match summary.render_plot(&self.outputs.plots_dir) {
            Ok(path) => Some(path),
            Err(err) => {
                eprintln!("WARN: {}", err);
                None
            }
        };

        let telemetry_dir = telemetry_dir(&self.outputs);
        let telemetry_path = self
            .logging_enabled
            .then(|| telemetry_dir.join(TELEMETRY_FILE));

        let telemetry_outputs = match telemetry_path.as_ref() {
            Some(path) => write_summary_outputs(path, &telemetry_dir)?,
            None => None,
        };

        if let Some(outputs) = telemetry_outputs.as_ref() {
            append_highlights_to_markdown(&self.outputs.summary_md, outputs)?;
        }

        Ok(RunSummary {
            hunts_played: self.schedule.len(),
            strategies: self.config.strategies.len(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            plot_path,
            telemetry_path,
            telemetry_outputs,
        })
    }

    fn play_hunt(
        &self,
        hunt_index: usize,
        hunt_seed: u64,
    ) -> Result<Vec<StrategyOutcome>, RunnerError> {
        let mut outcomes = Vec::with_capacity(self.config.strategies.len());
        for strategy in &self.config.strategies {
            let outcome = self.play_strategy(hunt_index, hunt_seed, strategy)?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn play_strategy(
        &self,
        hunt_index: usize,
        hunt_seed: u64,
        strategy: &StrategyConfig,
    ) -> Result<StrategyOutcome, RunnerError> {
        let hunt_error = |source: HuntError| RunnerError::Hunt {
            hunt_index,
            strategy: strategy.name.clone(),
            source,
        };

        // Same seed for every strategy: same treasure and the same sensor noise stream.
        let mut hunt = Hunt::with_seed(self.config.hunts.grid_size, &self.config.sensor, hunt_seed)
            .map_err(hunt_error)?;
        let mut policy = strategy.kind.spawn(hunt_seed);

        let start = Instant::now();
        let outcome = hunt.run(policy.as_mut(), &self.limits).map_err(hunt_error)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        if self.logging_enabled && tracing::enabled!(target: HUNT_TARGET, Level::INFO) {
            event!(
                target: HUNT_TARGET,
                Level::INFO,
                run_id = %self.config.run_id,
                hunt_index = hunt_index as u64,
                strategy = %strategy.name,
                found = outcome.found,
                sensings = outcome.sensings as u64,
                stop = outcome.stop.as_str(),
                entropy = outcome.metrics.entropy,
                elapsed_ms
            );
        }

        Ok(StrategyOutcome {
            strategy: strategy.name.clone(),
            outcome,
            elapsed_ms,
        })
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_hunt_rows(
    writer: &mut BufWriter<File>,
    config: &BenchmarkConfig,
    hunt_index: usize,
    hunt_seed: u64,
    outcomes: &[StrategyOutcome],
) -> Result<usize, RunnerError> {
    let hunt_id = hunt_id(hunt_index);

    let mut rows_written = 0usize;
    for entry in outcomes {
        let outcome = &entry.outcome;
        let row = HuntLogRow {
            run_id: &config.run_id,
            hunt_id: &hunt_id,
            hunt_index,
            hunt_seed,
            grid_size: config.hunts.grid_size,
            strategy: &entry.strategy,
            treasure: outcome.treasure,
            guess: outcome.guess,
            found: outcome.found,
            stop: outcome.stop,
            sensings: outcome.sensings,
            final_entropy: outcome.metrics.entropy,
            max_probability: outcome.metrics.max_probability,
            elapsed_ms: entry.elapsed_ms,
        };

        serde_json::to_writer(&mut *writer, &row)?;
        writer.write_all(b"\n")?;
        rows_written += 1;
    }

    Ok(rows_written)
}

#[derive(Serialize)]
struct HuntLogRow<'a> {
    run_id: &'a str,
    hunt_id: &'a str,
    hunt_index: usize,
    hunt_seed: u64,
    grid_size: usize,
    strategy: &'a str,
    treasure: Cell,
    guess: Cell,
    found: bool,
    stop: StopReason,
    sensings: usize,
    final_entropy: f64,
    max_probability: f64,
    elapsed_ms: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("at least one strategy is required")]
    NoStrategies,
    #[error("hunt {hunt_index} failed for strategy '{strategy}': {source}")]
    Hunt {
        hunt_index: usize,
        strategy: String,
        #[source]
        source: HuntError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
