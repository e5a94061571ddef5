//! Command-line interface definitions and argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Sales analytics from a CSV export: KPIs, revenue trend, customer segments,
/// inventory movement and an exported report.
///
/// Examples:
///   sales_report --input sales.csv kpi
///   sales_report --input sales.csv forecast --strategy linear --horizon 3
///   sales_report --input sales.csv segment -k 3 --seed 0
///   sales_report --input sales.csv --cost-based-profit report --chart bar
///   sales_report --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the sales CSV file
    #[arg(short, long, default_value = "sales.csv", value_name = "FILE")]
    pub input: PathBuf,

    /// Path to configuration file
    ///
    /// If not specified, looks for sales_report.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Derive missing Profit as a fixed share of Revenue
    #[arg(long, value_name = "RATE", conflicts_with = "cost_based_profit")]
    pub margin: Option<f64>,

    /// Derive missing Profit as Revenue - Cost (needs a Cost column)
    #[arg(long)]
    pub cost_based_profit: bool,

    /// Rows shown per console table
    #[arg(long, value_name = "ROWS")]
    pub preview_rows: Option<usize>,

    /// Write a default sales_report.toml and exit
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Total revenue, total profit, average monthly sales and top product
    Kpi,
    /// Revenue per period with a rolling-mean or linear trend
    Forecast {
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Rolling window size in periods
        #[arg(short, long)]
        window: Option<usize>,
        /// Periods to project past the data with the linear trend
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// K-Means segmentation of customers by total revenue
    Segment {
        /// Column identifying a customer (default: Customer, else Customer Email)
        #[arg(long, value_name = "COLUMN")]
        entity: Option<String>,
        /// Number of segments
        #[arg(short = 'k', long)]
        clusters: Option<usize>,
        /// Seed for centroid initialization
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Units sold per product, banded by movement
    Inventory,
    /// Run every analysis and export tables and charts
    Report {
        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Monthly revenue chart kind: bar, line or pie
        #[arg(long)]
        chart: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    Rolling,
    Linear,
}

impl Args {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let args = Args::parse_from(["sales_report", "-i", "q1.csv", "segment", "-k", "4"]);
        assert_eq!(args.input, PathBuf::from("q1.csv"));
        assert!(matches!(
            args.command,
            Some(Command::Segment {
                clusters: Some(4),
                seed: None,
                entity: None,
            })
        ));

        let args = Args::parse_from(["sales_report", "forecast", "--strategy", "linear"]);
        assert!(matches!(
            args.command,
            Some(Command::Forecast {
                strategy: Some(StrategyArg::Linear),
                ..
            })
        ));
    }

    #[test]
    fn test_profit_flags_conflict() {
        let result =
            Args::try_parse_from(["sales_report", "--margin", "0.3", "--cost-based-profit"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(Args::parse_from(["sales_report", "-v"]).log_level(), Level::DEBUG);
        assert_eq!(Args::parse_from(["sales_report", "-q"]).log_level(), Level::ERROR);
        assert_eq!(Args::parse_from(["sales_report"]).log_level(), Level::INFO);
    }
}
