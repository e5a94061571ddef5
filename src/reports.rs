use crate::chart::{ChartImage, ChartKind, ChartSink};
use crate::context::AnalysisContext;
use crate::error::{AnalysisError, AnalysisResult};
use crate::forecast::ForecastPoint;
use crate::kpi::{self, KpiResult};
use crate::loader::{PRODUCT, QUANTITY_SOLD};
use crate::schema::{validate, INVENTORY_COLUMNS};
use crate::segment::Segmentation;
use crate::types::{GroupTotalRow, InventoryRow, RecordTable};
use crate::util::format_number;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Upper bounds (inclusive) of the slow-moving and optimal stock bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryBins {
    pub slow_max: f64,
    pub optimal_max: f64,
}

impl Default for InventoryBins {
    fn default() -> Self {
        Self {
            slow_max: 20.0,
            optimal_max: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockStatus {
    SlowMoving,
    Optimal,
    FastMoving,
}

impl StockStatus {
    pub fn classify(quantity: f64, bins: &InventoryBins) -> Self {
        if quantity <= bins.slow_max {
            StockStatus::SlowMoving
        } else if quantity <= bins.optimal_max {
            StockStatus::Optimal
        } else {
            StockStatus::FastMoving
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StockStatus::SlowMoving => "Slow-moving",
            StockStatus::Optimal => "Optimal",
            StockStatus::FastMoving => "Fast-moving",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryItem {
    pub product: String,
    pub quantity_sold: f64,
    pub status: StockStatus,
}

impl InventoryItem {
    pub fn row(&self) -> InventoryRow {
        InventoryRow {
            product: self.product.clone(),
            quantity_sold: format_number(self.quantity_sold, 0),
            status: self.status.to_string(),
        }
    }
}

/// Units sold per product, banded into slow-moving / optimal / fast-moving.
pub fn inventory_status(
    table: &RecordTable,
    bins: &InventoryBins,
) -> AnalysisResult<Vec<InventoryItem>> {
    validate(table, &INVENTORY_COLUMNS)?;
    let totals = kpi::grouped_sum(table, PRODUCT, QUANTITY_SOLD)?;
    Ok(totals
        .into_iter()
        .map(|(product, quantity_sold)| InventoryItem {
            status: StockStatus::classify(quantity_sold, bins),
            product,
            quantity_sold,
        })
        .collect())
}

pub fn group_rows(series: &[(String, f64)]) -> Vec<GroupTotalRow> {
    series
        .iter()
        .map(|(group, total)| GroupTotalRow {
            group: group.clone(),
            total: format_number(*total, 2),
        })
        .collect()
}

/// An analysis that could not run, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub section: &'static str,
    pub reason: AnalysisError,
}

/// Everything one run produces. Each section is computed independently, so a
/// table without customers still gets its KPIs and forecast.
#[derive(Debug, Clone, Default)]
pub struct ReportBundle {
    pub kpis: Option<KpiResult>,
    pub monthly_revenue: Vec<(String, f64)>,
    pub forecast: Vec<ForecastPoint>,
    pub projection: Vec<f64>,
    pub segments: Option<Segmentation>,
    pub inventory: Vec<InventoryItem>,
    pub charts: Vec<ChartImage>,
    pub skipped: Vec<Skipped>,
}

impl ReportBundle {
    fn record<T>(&mut self, section: &'static str, outcome: AnalysisResult<T>) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(reason) => {
                warn!(section, %reason, "analysis skipped");
                self.skipped.push(Skipped { section, reason });
                None
            }
        }
    }
}

pub fn generate_report(ctx: &AnalysisContext, sink: &dyn ChartSink) -> ReportBundle {
    let mut bundle = ReportBundle::default();

    let kpis = ctx.kpis();
    bundle.kpis = bundle.record("kpi", kpis);

    let monthly = ctx.monthly_revenue();
    if let Some(monthly) = bundle.record("monthly revenue", monthly) {
        bundle.monthly_revenue = monthly;
    }

    let forecast = ctx.forecast();
    if let Some(points) = bundle.record("forecast", forecast) {
        bundle.forecast = points;
    }

    if ctx.settings.horizon > 0 {
        let projection = ctx.projection();
        if let Some(projection) = bundle.record("projection", projection) {
            bundle.projection = projection;
        }
    }

    let segments = ctx.segments();
    bundle.segments = bundle.record("segmentation", segments);

    let inventory = ctx.inventory();
    if let Some(items) = bundle.record("inventory", inventory) {
        bundle.inventory = items;
    }

    let mut requests: Vec<(ChartKind, Vec<(String, f64)>, &str)> = Vec::new();
    if !bundle.monthly_revenue.is_empty() {
        requests.push((ctx.settings.chart, bundle.monthly_revenue.clone(), "Monthly Revenue"));
    }
    if !bundle.forecast.is_empty() {
        let trend = bundle
            .forecast
            .iter()
            .map(|p| (p.period.clone(), p.forecast))
            .collect();
        requests.push((ChartKind::Line, trend, "Revenue Trend"));
    }
    if let Some(segments) = &bundle.segments {
        let sizes = segments
            .cluster_sizes()
            .into_iter()
            .enumerate()
            .map(|(i, n)| (format!("Segment {}", i), n as f64))
            .collect();
        requests.push((ChartKind::Bar, sizes, "Customer Segments"));
    }
    for (kind, series, title) in requests {
        let image = sink.render(kind, &series, title);
        if let Some(image) = bundle.record("chart", image) {
            bundle.charts.push(image);
        }
    }

    info!(
        charts = bundle.charts.len(),
        skipped = bundle.skipped.len(),
        "report assembled"
    );
    bundle
}
