use std::path::PathBuf;

use clap::Parser;

use treasure_bench::config::{BenchmarkConfig, ResolvedOutputs};
use treasure_bench::logging::init_logging;
use treasure_bench::runner::BenchmarkRunner;
use treasure_core::AppInfo;

/// Seeded benchmark harness for treasure-hunt sensing strategies.
#[derive(Debug, Parser)]
#[command(
    name = "treasure-bench",
    author,
    version = AppInfo::version(),
    about = "Deterministic treasure-hunt benchmark harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of hunts to play.
    #[arg(long, value_name = "HUNTS")]
    hunts: Option<usize>,

    /// Override the RNG seed used to derive hunt seeds.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the grid dimension.
    #[arg(long, value_name = "SIZE")]
    grid_size: Option<usize>,

    /// Exit after validating the configuration (no hunts are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    println!(
        "{} v{} ({})",
        AppInfo::name(),
        AppInfo::version(),
        AppInfo::codename()
    );
    let mut config = BenchmarkConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(hunts) = cli.hunts {
        config.hunts.count = hunts;
    }

    if let Some(seed) = cli.seed {
        config.hunts.seed = Some(seed);
    }

    if let Some(grid_size) = cli.grid_size {
        config.hunts.grid_size = grid_size;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let strategy_count = config.strategies.len();
    let run_id = config.run_id.clone();
    let hunts = config.hunts.count;
    let grid_size = config.hunts.grid_size;

    println!(
        "Loaded configuration '{run_id}' with {strategy_count} strateg{} ({hunts} hunts on a {grid_size}x{grid_size} grid)",
        if strategy_count == 1 { "y" } else { "ies" }
    );

    for warning in config.sensor_warnings() {
        eprintln!("WARN: {warning}");
    }

    if cli.validate_only {
        println!("Validation-only mode: benchmark execution skipped.");
        return Ok(());
    }

    let _logging_guard = init_logging(&config, &outputs)?;
    let runner = BenchmarkRunner::new(config, outputs)?;
    let summary = runner.run()?;

    println!(
        "Benchmark complete for '{run_id}': {} hunts × {} strategies → {} rows at {}",
        summary.hunts_played,
        summary.strategies,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(plot_path) = summary.plot_path.as_ref() {
        println!("Sensing plot: {}", plot_path.display());
    }
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }
    if let Some(outputs) = summary.telemetry_outputs.as_ref() {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        let hunts = &outputs.summary.hunts;
        match hunts.avg_sensings {
            Some(avg) => println!(
                "  Hunts: {} events, {} found, avg {:.2} sensings",
                hunts.count, hunts.found, avg
            ),
            None => println!("  Hunts: {} events captured", hunts.count),
        }
        if !hunts.stop_counts.is_empty() {
            println!("  Stop reasons: {:?}", hunts.stop_counts);
        }
    }

    Ok(())
}
