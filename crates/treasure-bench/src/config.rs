use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use treasure_core::hunt::HuntLimits;
use treasure_core::policy::PolicyKind;
use treasure_core::sensor::ColorModel;

const DEFAULT_CONFIDENCE: f64 = 0.9;
const MAX_GRID_SIZE: usize = 256;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    pub hunts: HuntsConfig,
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub sensor: ColorModel,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchmarkConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.hunts.validate()?;
        self.outputs.validate(&self.run_id)?;
        validate_strategies(&self.strategies)?;
        self.metrics.validate(&self.strategies)?;
        self.logging.normalize();
        Ok(())
    }

    /// Non-fatal findings about the sensor table on the configured grid.
    pub fn sensor_warnings(&self) -> Vec<String> {
        let size = self.hunts.grid_size;
        self.sensor
            .unreachable_bands(size)
            .into_iter()
            .map(|band| {
                format!(
                    "sensor band {band} (up_to {}) is never reached on a {size}x{size} grid",
                    self.sensor.bands()[band].up_to
                )
            })
            .collect()
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            plots_dir: resolve_template(&self.run_id, &self.outputs.plots_dir),
        }
    }
}

/// Episode generation block.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HuntsConfig {
    pub seed: Option<u64>,
    pub count: usize,
    pub grid_size: usize,
    /// Defaults to the number of grid cells.
    #[serde(default)]
    pub max_sensings: Option<usize>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl HuntsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(ValidationError::InvalidField {
                field: "hunts.count".to_string(),
                message: "number of hunts must be greater than zero".to_string(),
            });
        }

        if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE {
            return Err(ValidationError::InvalidField {
                field: "hunts.grid_size".to_string(),
                message: format!("grid size must be between 1 and {MAX_GRID_SIZE}"),
            });
        }

        if self.max_sensings == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "hunts.max_sensings".to_string(),
                message: "sensing budget must be at least 1".to_string(),
            });
        }

        if !(self.confidence > 0.0 && self.confidence <= 1.0) {
            return Err(ValidationError::InvalidField {
                field: "hunts.confidence".to_string(),
                message: "confidence must lie in (0, 1]".to_string(),
            });
        }

        Ok(())
    }

    pub fn limits(&self) -> HuntLimits {
        let mut limits = HuntLimits::exhaustive(self.grid_size, self.confidence);
        if let Some(budget) = self.max_sensings {
            limits.max_sensings = budget;
        }
        limits
    }
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// A sensing strategy taking part in the benchmark.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub kind: PolicyKind,
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    pub plots_dir: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
            ("outputs.plots_dir", &self.plots_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Metrics configuration block.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub baseline: Option<String>,
}

impl MetricsConfig {
    fn validate(&self, strategies: &[StrategyConfig]) -> Result<(), ValidationError> {
        let Some(baseline) = self.baseline.as_ref() else {
            return Err(ValidationError::InvalidField {
                field: "metrics.baseline".to_string(),
                message: "baseline strategy must be specified".to_string(),
            });
        };

        if !strategies.iter().any(|s| &s.name == baseline) {
            return Err(ValidationError::InvalidField {
                field: "metrics.baseline".to_string(),
                message: format!("baseline strategy '{baseline}' is not defined in strategies list"),
            });
        }

        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_strategies(strategies: &[StrategyConfig]) -> Result<(), ValidationError> {
    if strategies.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "strategies".to_string(),
            message: "at least one strategy must be specified".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for strategy in strategies {
        if strategy.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "strategies.name".to_string(),
                message: "strategy name must not be empty".to_string(),
            });
        }

        if !strategy.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
            return Err(ValidationError::InvalidField {
                field: format!("strategies[{}].name", strategy.name),
                message: "strategy name contains invalid characters".to_string(),
            });
        }

        if !seen.insert(strategy.name.as_str()) {
            return Err(ValidationError::InvalidField {
                field: "strategies".to_string(),
                message: format!("strategy name '{}' defined more than once", strategy.name),
            });
        }
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub plots_dir: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use treasure_core::sensor::SensorColor;

    const BASIC_YAML: &str = r#"
run_id: "smoke_8x8"
hunts:
  seed: 123
  count: 16
  grid_size: 8
strategies:
  - name: "belief"
    kind: "recommended"
  - name: "sweep"
    kind: "row_sweep"
outputs:
  jsonl: "bench/out/{run_id}/hunts.jsonl"
  summary_md: "bench/out/{run_id}/summary.md"
  plots_dir: "bench/out/{run_id}/plots"
metrics:
  baseline: "sweep"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(BASIC_YAML).expect("parse yaml");
        cfg.validate().expect("validate");

        assert_eq!(cfg.hunts.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(cfg.sensor, ColorModel::default());
        assert_eq!(cfg.strategies[0].kind, PolicyKind::Recommended);
        assert!(cfg.logging.enable_structured);
        assert_eq!(cfg.logging.level(), Some(Level::DEBUG));

        let limits = cfg.hunts.limits();
        assert_eq!(limits.max_sensings, 64);

        let outputs = cfg.resolved_outputs();
        assert_eq!(
            outputs.jsonl,
            PathBuf::from("bench/out/smoke_8x8/hunts.jsonl")
        );
    }

    #[test]
    fn custom_sensor_table_is_parsed() {
        let yaml = format!(
            "{BASIC_YAML}sensor:\n  - {{ up_to: 0, red: 1.0, orange: 0.0, yellow: 0.0, green: 0.0 }}\n  - {{ up_to: 3, red: 0.0, orange: 0.0, yellow: 0.0, green: 1.0 }}\n"
        );
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.sensor.bands().len(), 2);
        assert_eq!(cfg.sensor.probability(SensorColor::Green, 9), 1.0);
    }

    #[test]
    fn warns_about_bands_the_grid_cannot_reach() {
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(BASIC_YAML).expect("parse");
        cfg.validate().expect("valid");
        assert!(cfg.sensor_warnings().is_empty());

        cfg.hunts.grid_size = 3;
        cfg.validate().expect("small grids stay valid");
        let warnings = cfg.sensor_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sensor band 3 (up_to 5)"));
        assert!(warnings[0].contains("3x3"));
    }

    #[test]
    fn malformed_sensor_table_fails_to_parse() {
        let yaml = format!(
            "{BASIC_YAML}sensor:\n  - {{ up_to: 0, red: 0.0, orange: 0.0, yellow: 0.0, green: 0.0 }}\n"
        );
        assert!(serde_yaml::from_str::<BenchmarkConfig>(&yaml).is_err());
    }

    #[test]
    fn rejects_missing_baseline() {
        let yaml = BASIC_YAML.replace("  baseline: \"sweep\"\n", "");
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("should fail");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "metrics.baseline"
        ));
    }

    #[test]
    fn rejects_duplicate_strategies() {
        let yaml = BASIC_YAML.replace("name: \"sweep\"", "name: \"belief\"");
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("duplicate strategies should fail");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "strategies"
        ));
    }

    #[test]
    fn rejects_out_of_range_hunt_settings() {
        for (from, to, field) in [
            ("grid_size: 8", "grid_size: 0", "hunts.grid_size"),
            ("count: 16", "count: 0", "hunts.count"),
            (
                "grid_size: 8",
                "grid_size: 8\n  confidence: 1.5",
                "hunts.confidence",
            ),
            (
                "grid_size: 8",
                "grid_size: 8\n  max_sensings: 0",
                "hunts.max_sensings",
            ),
        ] {
            let yaml = BASIC_YAML.replace(from, to);
            let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("parse");
            let err = cfg.validate().expect_err("should fail");
            assert!(matches!(
                err,
                ValidationError::InvalidField { field: ref f, .. } if f == field
            ));
        }
    }

    #[test]
    fn rejects_invalid_run_id() {
        let yaml = BASIC_YAML.replace("smoke_8x8", "smoke 8x8");
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("invalid run id");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "run_id"
        ));
    }
}
