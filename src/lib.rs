//! Sales analytics over an uploaded CSV: KPI aggregation, revenue trend
//! forecasting, customer segmentation and inventory banding, with chart
//! rendering and report export on top.

pub mod chart;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod forecast;
pub mod kpi;
pub mod loader;
pub mod output;
pub mod reports;
pub mod schema;
pub mod segment;
pub mod types;
pub mod util;

pub use chart::{ChartImage, ChartKind, ChartSink, SvgChartSink};
pub use context::{AnalysisContext, AnalysisSettings, SessionCache};
pub use error::{AnalysisError, AnalysisResult};
pub use forecast::{ForecastPoint, ForecastStrategy};
pub use kpi::KpiResult;
pub use loader::{load_and_clean, load_from_reader, LoadReport, ProfitPolicy};
pub use segment::{SegmentAssignment, SegmentParams, Segmentation};
pub use types::{ColumnKind, RecordTable, Value};
