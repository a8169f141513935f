use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const RUN_TARGET: &str = "treasure_bench::run";
pub const HUNT_TARGET: &str = "treasure_bench::hunt";
pub const SENSOR_TARGET: &str = "treasure_core::hunt";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    /// Taken from the "benchmark started" event.
    pub run_id: Option<String>,
    pub hunts: HuntTelemetrySummary,
    pub readings: ReadingTelemetrySummary,
}

#[derive(Debug, Default, Serialize)]
pub struct HuntTelemetrySummary {
    pub count: usize,
    pub found: usize,
    pub avg_sensings: Option<f64>,
    pub avg_final_entropy: Option<f64>,
    pub stop_counts: BTreeMap<String, usize>,
}

/// Per-reading events are emitted at debug level and stay empty at the default level.
#[derive(Debug, Default, Serialize)]
pub struct ReadingTelemetrySummary {
    pub count: usize,
    pub color_counts: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregate hunt and reading events from a JSON tracing log.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut run_id = None;
    let mut hunts = HuntTelemetrySummary::default();
    let mut readings = ReadingTelemetrySummary::default();
    let mut sensings_avg = Average::new();
    let mut entropy_avg = Average::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match target {
            RUN_TARGET => {
                run_id = fields
                    .get("run_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            HUNT_TARGET => {
                hunts.count += 1;
                if fields.get("found").and_then(Value::as_bool) == Some(true) {
                    hunts.found += 1;
                }
                if let Some(sensings) = fields.get("sensings").and_then(Value::as_f64) {
                    sensings_avg.add(sensings);
                }
                if let Some(entropy) = fields.get("entropy").and_then(Value::as_f64) {
                    entropy_avg.add(entropy);
                }
                *hunts.stop_counts.entry(label(&fields, "stop")).or_insert(0) += 1;
            }
            SENSOR_TARGET if message(&fields) == Some("sensor reading") => {
                readings.count += 1;
                *readings
                    .color_counts
                    .entry(label(&fields, "color"))
                    .or_insert(0) += 1;
            }
            _ => {}
        }
    }

    hunts.avg_sensings = sensings_avg.mean();
    hunts.avg_final_entropy = entropy_avg.mean();

    Ok(TelemetrySummary {
        run_id,
        hunts,
        readings,
    })
}

fn message(fields: &Map<String, Value>) -> Option<&str> {
    fields.get("message").and_then(Value::as_str)
}

fn label(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("<unset>")
        .to_string()
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(&json_path, serde_json::to_vec_pretty(&summary)?).map_err(|source| {
        TelemetryError::Io {
            context: "writing telemetry summary json",
            source,
        }
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    section.push_str(&render_hunts(&outputs.summary.hunts));

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn render_hunts(hunts: &HuntTelemetrySummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("- Hunt events captured: {}\n", hunts.count));
    out.push_str(&format!("- Treasures found: {}\n", hunts.found));
    if let Some(value) = hunts.avg_sensings {
        out.push_str(&format!("- Avg sensings: {:.2}\n", value));
    }
    if let Some(value) = hunts.avg_final_entropy {
        out.push_str(&format!("- Avg final entropy: {:.3}\n", value));
    }
    if !hunts.stop_counts.is_empty() {
        out.push_str("- Stop reasons:\n");
        for (label, count) in &hunts.stop_counts {
            out.push_str(&format!("  - {}: {}\n", label, count));
        }
    }
    out
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    if let Some(run_id) = summary.run_id.as_deref() {
        output.push_str(&format!("- Run: `{run_id}`\n"));
    }
    output.push('\n');

    output.push_str("## Hunts\n");
    output.push_str(&render_hunts(&summary.hunts));
    output.push('\n');

    output.push_str("## Sensor Readings\n");
    output.push_str(&format!("- Events: {}\n", summary.readings.count));
    if summary.readings.color_counts.is_empty() {
        output.push_str("- <none>\n");
    } else {
        for (label, count) in &summary.readings.color_counts {
            output.push_str(&format!("- {}: {}\n", label, count));
        }
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}
