//! Configuration file handling.
//!
//! Settings come from `sales_report.toml` (or `--config`), with every field
//! defaulted, and are then overridden by explicit CLI flags.

use crate::chart::ChartKind;
use crate::cli::{Args, Command, StrategyArg};
use crate::context::AnalysisSettings;
use crate::forecast::{ForecastStrategy, DEFAULT_WINDOW};
use crate::loader::{ProfitPolicy, MONTH};
use crate::reports::InventoryBins;
use crate::segment::SegmentParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "sales_report.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// How `Profit` is derived when the file lacks it.
    #[serde(default)]
    pub profit: ProfitPolicy,

    #[serde(default)]
    pub forecast: ForecastConfig,

    /// K-Means settings.
    #[serde(default)]
    pub segment: SegmentParams,

    /// Stock movement bands.
    #[serde(default)]
    pub inventory: InventoryBins,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Forecast strategy names as written in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    RollingMean,
    LinearFit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Rolling window in periods; unused by `linear_fit`.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Periods to project past the data with the linear trend (0 = none).
    #[serde(default)]
    pub horizon: usize,

    /// Column the revenue series is grouped by.
    #[serde(default = "default_period_column")]
    pub period_column: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            window: default_window(),
            horizon: 0,
            period_column: default_period_column(),
        }
    }
}

impl ForecastConfig {
    pub fn strategy(&self) -> ForecastStrategy {
        match self.strategy {
            StrategyKind::RollingMean => ForecastStrategy::RollingMean {
                window: self.window,
            },
            StrategyKind::LinearFit => ForecastStrategy::LinearFit,
        }
    }
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_period_column() -> String {
    MONTH.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the `report` command exports into.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Chart kind for the monthly revenue chart.
    #[serde(default = "default_chart")]
    pub chart: ChartKind,

    /// Rows shown in each console preview.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            chart: default_chart(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("sales_report_out")
}

fn default_chart() -> ChartKind {
    ChartKind::Line
}

fn default_preview_rows() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `--config` if given, else the default file if it exists, else
    /// built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only flags the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &Args) -> Result<()> {
        if args.cost_based_profit {
            self.profit = ProfitPolicy::CostBased;
        } else if let Some(rate) = args.margin {
            self.profit = ProfitPolicy::FixedMargin { rate };
        }

        match &args.command {
            Some(Command::Forecast {
                strategy,
                window,
                horizon,
            }) => {
                if let Some(w) = window {
                    self.forecast.window = *w;
                }
                match (strategy, window) {
                    (Some(StrategyArg::Linear), Some(_)) => {
                        warn!("--window has no effect with the linear strategy");
                        self.forecast.strategy = StrategyKind::LinearFit;
                    }
                    (Some(StrategyArg::Linear), None) => {
                        self.forecast.strategy = StrategyKind::LinearFit;
                    }
                    (Some(StrategyArg::Rolling), _) => {
                        self.forecast.strategy = StrategyKind::RollingMean;
                    }
                    // A bare --window asks for the rolling mean.
                    (None, Some(_)) => {
                        if self.forecast.strategy == StrategyKind::LinearFit {
                            warn!("--window overrides the configured linear_fit strategy");
                        }
                        self.forecast.strategy = StrategyKind::RollingMean;
                    }
                    (None, None) => {}
                }
                if let Some(h) = horizon {
                    self.forecast.horizon = *h;
                }
            }
            Some(Command::Segment {
                clusters,
                seed,
                entity,
            }) => {
                if let Some(column) = entity {
                    self.segment.entity_column = Some(column.clone());
                }
                if let Some(k) = clusters {
                    self.segment.clusters = *k;
                }
                if let Some(s) = seed {
                    self.segment.seed = *s;
                }
            }
            Some(Command::Report { output, chart }) => {
                if let Some(dir) = output {
                    self.output.dir = dir.clone();
                }
                if let Some(kind) = chart {
                    self.output.chart = kind.parse()?;
                }
            }
            Some(Command::Kpi) | Some(Command::Inventory) | None => {}
        }

        if let Some(rows) = args.preview_rows {
            self.output.preview_rows = rows;
        }
        Ok(())
    }

    pub fn settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            profit: self.profit,
            forecast: self.forecast.strategy(),
            horizon: self.forecast.horizon,
            period_column: self.forecast.period_column.clone(),
            segment: self.segment.clone(),
            inventory: self.inventory,
            chart: self.output.chart,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
