use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;
use treasure_core::hunt::StopReason;
use treasure_core::policy::PolicyKind;

use crate::config::{BenchmarkConfig, StrategyConfig};
use crate::runner::StrategyOutcome;

const CONFIDENCE_Z: f64 = 1.96; // 95% CI

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("baseline strategy '{0}' not present in benchmark results")]
    MissingBaseline(String),
    #[error("strategy '{0}' defined in results but missing from configuration")]
    UnknownStrategy(String),
    #[error("baseline '{0}' missing for hunt {1}")]
    MissingBaselineHunt(String, String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

pub struct AnalyticsCollector {
    baseline: String,
    strategies: HashMap<String, StrategyAccumulator>,
    comparisons: HashMap<String, ComparisonAccumulator>,
    strategy_order: Vec<String>,
    grid_size: usize,
}

impl AnalyticsCollector {
    pub fn new(config: &BenchmarkConfig) -> Result<Self, AnalyticsError> {
        let baseline = config
            .metrics
            .baseline
            .clone()
            .ok_or_else(|| AnalyticsError::MissingBaseline("<unset>".into()))?;

        if !config.strategies.iter().any(|s| s.name == baseline) {
            return Err(AnalyticsError::MissingBaseline(baseline));
        }

        let mut strategies = HashMap::new();
        let mut order = Vec::new();
        for strategy in &config.strategies {
            strategies.insert(
                strategy.name.clone(),
                StrategyAccumulator::new(strategy.clone()),
            );
            order.push(strategy.name.clone());
        }

        Ok(Self {
            baseline,
            strategies,
            comparisons: HashMap::new(),
            strategy_order: order,
            grid_size: config.hunts.grid_size,
        })
    }

    pub fn record_hunt(
        &mut self,
        hunt_index: usize,
        outcomes: &[StrategyOutcome],
    ) -> Result<(), AnalyticsError> {
        let hunt_id = hunt_id(hunt_index);

        let baseline_sensings = outcomes
            .iter()
            .find(|entry| entry.strategy == self.baseline)
            .map(|entry| entry.outcome.sensings as f64)
            .ok_or_else(|| {
                AnalyticsError::MissingBaselineHunt(self.baseline.clone(), hunt_id.clone())
            })?;

        for entry in outcomes {
            let acc = self
                .strategies
                .get_mut(&entry.strategy)
                .ok_or_else(|| AnalyticsError::UnknownStrategy(entry.strategy.clone()))?;
            acc.record(entry);
        }

        for entry in outcomes {
            if entry.strategy == self.baseline {
                continue;
            }
            let diff = entry.outcome.sensings as f64 - baseline_sensings;
            self.comparisons
                .entry(entry.strategy.clone())
                .or_insert_with(ComparisonAccumulator::new)
                .record(diff);
        }

        Ok(())
    }

    pub fn finalize(mut self) -> Result<AnalyticsSummary, AnalyticsError> {
        let mut reports = Vec::new();
        for name in &self.strategy_order {
            if let Some(acc) = self.strategies.remove(name) {
                reports.push(acc.into_report());
            }
        }

        let mut comparisons = Vec::new();
        for report in &reports {
            if report.name == self.baseline {
                comparisons.push(ComparisonReport {
                    strategy: report.name.clone(),
                    p_value: 1.0,
                    sample_size: report.hunts,
                });
                continue;
            }
            let (p_value, sample_size) = match self.comparisons.remove(&report.name) {
                Some(comp) => comp.wilcoxon_signed_rank(),
                None => (1.0, 0),
            };
            comparisons.push(ComparisonReport {
                strategy: report.name.clone(),
                p_value,
                sample_size,
            });
        }

        Ok(AnalyticsSummary {
            baseline: self.baseline,
            strategies: reports,
            comparisons,
            grid_size: self.grid_size,
        }
        .enrich())
    }
}

pub(crate) fn hunt_id(hunt_index: usize) -> String {
    format!("H{hunt_index:05}")
}

struct StrategyAccumulator {
    config: StrategyConfig,
    hunts: u32,
    found: u32,
    confident_stops: u32,
    per_hunt_sensings: Vec<f64>,
    total_entropy: f64,
    total_ms: f64,
}

impl StrategyAccumulator {
    fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            hunts: 0,
            found: 0,
            confident_stops: 0,
            per_hunt_sensings: Vec::new(),
            total_entropy: 0.0,
            total_ms: 0.0,
        }
    }

    fn record(&mut self, entry: &StrategyOutcome) {
        let outcome = &entry.outcome;
        self.hunts += 1;
        if outcome.found {
            self.found += 1;
        }
        if outcome.stop == StopReason::Confident {
            self.confident_stops += 1;
        }
        self.per_hunt_sensings.push(outcome.sensings as f64);
        self.total_entropy += outcome.metrics.entropy;
        self.total_ms += entry.elapsed_ms;
    }

    fn into_report(self) -> StrategyReport {
        let hunts = f64::from(self.hunts.max(1));
        let avg_sensings = self.per_hunt_sensings.iter().sum::<f64>() / hunts;
        let ci95 = confidence_interval(&self.per_hunt_sensings);

        StrategyReport {
            name: self.config.name,
            kind: self.config.kind,
            hunts: self.hunts as usize,
            avg_sensings,
            ci95,
            found: self.found as usize,
            success_rate: f64::from(self.found) / hunts,
            confident_stops: self.confident_stops as usize,
            avg_final_entropy: self.total_entropy / hunts,
            average_ms_per_hunt: self.total_ms / hunts,
            delta_vs_baseline: 0.0, // Filled once the baseline report is known
        }
    }
}

#[derive(Clone)]
struct ComparisonAccumulator {
    diffs: Vec<f64>,
}

impl ComparisonAccumulator {
    fn new() -> Self {
        Self { diffs: Vec::new() }
    }

    fn record(&mut self, diff: f64) {
        self.diffs.push(diff);
    }

    /// Two-sided paired Wilcoxon signed-rank test (normal approximation).
    fn wilcoxon_signed_rank(self) -> (f64, usize) {
        let mut paired: Vec<(f64, f64)> = self
            .diffs
            .into_iter()
            .filter(|d| d.abs() > f64::EPSILON)
            .map(|d| (d.abs(), d.signum()))
            .collect();
        let n = paired.len();
        if n == 0 {
            return (1.0, 0);
        }
        paired.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Average ranks across ties
        let mut w_plus = 0.0;
        let mut w_minus = 0.0;
        let mut tie_adjustment = 0.0;
        let mut start = 0;
        while start < n {
            let mut end = start;
            while end + 1 < n && (paired[end + 1].0 - paired[start].0).abs() < 1e-12 {
                end += 1;
            }
            let rank = (start + end + 2) as f64 / 2.0;
            for (_, sign) in &paired[start..=end] {
                if *sign > 0.0 {
                    w_plus += rank;
                } else {
                    w_minus += rank;
                }
            }
            let ties = (end - start + 1) as f64;
            if ties > 1.0 {
                tie_adjustment += (ties.powi(3) - ties) / 48.0;
            }
            start = end + 1;
        }

        let n_f = n as f64;
        let mean_w = n_f * (n_f + 1.0) / 4.0;
        let variance_w = n_f * (n_f + 1.0) * (2.0 * n_f + 1.0) / 24.0 - tie_adjustment;
        if variance_w <= 0.0 {
            return (1.0, n);
        }
        let Ok(normal) = Normal::new(0.0, 1.0) else {
            return (1.0, n);
        };

        let w: f64 = f64::min(w_plus, w_minus);
        let z = ((w - mean_w).abs() - 0.5) / variance_w.sqrt();
        let p = 2.0 * (1.0 - normal.cdf(z));
        (p.clamp(0.0, 1.0), n)
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub baseline: String,
    pub strategies: Vec<StrategyReport>,
    pub comparisons: Vec<ComparisonReport>,
    pub grid_size: usize,
}

impl AnalyticsSummary {
    pub fn enrich(mut self) -> Self {
        let baseline_avg = self
            .strategies
            .iter()
            .find(|report| report.name == self.baseline)
            .map(|report| report.avg_sensings)
            .unwrap_or(0.0);

        for report in &mut self.strategies {
            report.delta_vs_baseline = report.avg_sensings - baseline_avg;
        }

        self
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str("# Treasure Hunt Summary\n\n");
        rows.push_str(&format!(
            "Grid: {size}x{size}, baseline strategy: `{baseline}`\n\n",
            size = self.grid_size,
            baseline = self.baseline
        ));
        rows.push_str("| Strategy | Kind | Hunts | Avg sensings | Δ vs baseline | 95% CI | Found % | Confident % | Avg entropy | Avg ms/hunt | p-value |\n");
        rows.push_str("|----------|------|-------|--------------|---------------|--------|---------|-------------|-------------|-------------|---------|\n");

        for report in &self.strategies {
            let p_value = self
                .comparisons
                .iter()
                .find(|c| c.strategy == report.name)
                .map(|c| c.p_value)
                .unwrap_or(1.0);
            let confident_rate = if report.hunts == 0 {
                0.0
            } else {
                report.confident_stops as f64 / report.hunts as f64
            };

            rows.push_str(&format!(
                "| {name} | {kind:?} | {hunts} | {avg:.2} | {delta:+.2} | [{ci_low:.2}, {ci_high:.2}] | {found:.1}% | {confident:.1}% | {entropy:.3} | {latency:.3} | {pval:.3} |\n",
                name = report.name,
                kind = report.kind,
                hunts = report.hunts,
                avg = report.avg_sensings,
                delta = report.delta_vs_baseline,
                ci_low = report.ci95.0,
                ci_high = report.ci95.1,
                found = report.success_rate * 100.0,
                confident = confident_rate * 100.0,
                entropy = report.avg_final_entropy,
                latency = report.average_ms_per_hunt,
                pval = p_value,
            ));
        }

        fs::write(path.as_ref(), rows).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })?;
        Ok(())
    }

    pub fn render_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
                context: "creating plots directory",
                source: e,
            })?;
        }

        let output_path = dir.join("avg_sensings.png");
        let baseline = self.baseline.clone();
        let reports = self.strategies.clone();

        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let plot_attempt = std::panic::catch_unwind(move || {
            let root = BitMapBackend::new(&output_path, (800, 480)).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            let y_max = reports
                .iter()
                .map(|r| r.ci95.1.max(r.avg_sensings))
                .fold(1.0f64, f64::max);

            let mut chart = ChartBuilder::on(&root)
                .margin(20)
                .set_label_area_size(LabelAreaPosition::Left, 50)
                .set_label_area_size(LabelAreaPosition::Bottom, 40)
                .build_cartesian_2d(0..reports.len(), 0.0..(y_max * 1.1))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .configure_mesh()
                .disable_mesh()
                .y_desc("Avg sensings per hunt")
                .x_desc("Strategy")
                .x_label_formatter(&|idx| {
                    reports
                        .get(*idx)
                        .map(|report| report.name.clone())
                        .unwrap_or_default()
                })
                .draw()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(reports.iter().enumerate().map(|(idx, report)| {
                    let color = if report.name == baseline {
                        &BLUE
                    } else if report.delta_vs_baseline <= 0.0 {
                        &GREEN
                    } else {
                        &RED
                    };
                    Rectangle::new([(idx, 0.0), (idx + 1, report.avg_sensings)], color.filled())
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(chart);

            root.present()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(root);

            Ok(output_path)
        });

        std::panic::set_hook(prev_hook);

        match plot_attempt {
            Ok(result) => result,
            Err(_) => Err(AnalyticsError::Plot(
                "plotters panicked while rendering (missing font support?)".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyReport {
    pub name: String,
    pub kind: PolicyKind,
    pub hunts: usize,
    pub avg_sensings: f64,
    pub ci95: (f64, f64),
    pub found: usize,
    pub success_rate: f64,
    pub confident_stops: usize,
    pub avg_final_entropy: f64,
    pub average_ms_per_hunt: f64,
    #[serde(skip)]
    pub delta_vs_baseline: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub strategy: String,
    pub p_value: f64,
    pub sample_size: usize,
}

fn confidence_interval(points: &[f64]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mean = points.iter().sum::<f64>() / points.len() as f64;
    if points.len() == 1 {
        return (mean, mean);
    }
    let variance = points
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (points.len() as f64 - 1.0);
    let std_error = (variance / points.len() as f64).sqrt();
    let margin = CONFIDENCE_Z * std_error;
    (mean - margin, mean + margin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_samples_have_degenerate_interval() {
        assert_eq!(confidence_interval(&[]), (0.0, 0.0));
        assert_eq!(confidence_interval(&[4.0]), (4.0, 4.0));
        let (low, high) = confidence_interval(&[3.0, 3.0, 3.0]);
        assert_eq!(low, 3.0);
        assert_eq!(high, 3.0);
    }

    #[test]
    fn wilcoxon_ignores_zero_differences() {
        let mut comp = ComparisonAccumulator::new();
        for _ in 0..5 {
            comp.record(0.0);
        }
        assert_eq!(comp.wilcoxon_signed_rank(), (1.0, 0));
    }

    #[test]
    fn wilcoxon_detects_consistent_improvement() {
        let mut comp = ComparisonAccumulator::new();
        for i in 0..30 {
            comp.record(-1.0 - (i % 4) as f64);
        }
        let (p_value, n) = comp.wilcoxon_signed_rank();
        assert_eq!(n, 30);
        assert!(p_value < 0.01, "p-value {p_value} should be tiny");
    }

    #[test]
    fn wilcoxon_balanced_differences_are_not_significant() {
        let mut comp = ComparisonAccumulator::new();
        for i in 0..20 {
            let magnitude = 1.0 + (i / 2) as f64;
            comp.record(if i % 2 == 0 { magnitude } else { -magnitude });
        }
        let (p_value, _) = comp.wilcoxon_signed_rank();
        assert!(p_value > 0.5);
    }
}
