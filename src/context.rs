// Caller-owned analysis state.
//
// An `AnalysisContext` holds one loaded table and the settings used to read
// it. Callers pass it into every analysis; nothing here is process-wide. A
// hosting layer that remembers the last upload per caller keeps contexts in a
// `SessionCache`, one slot per caller id.
use crate::chart::ChartKind;
use crate::error::AnalysisResult;
use crate::forecast::{self, ForecastPoint, ForecastStrategy};
use crate::kpi::{self, KpiResult};
use crate::loader::{self, LoadReport, ProfitPolicy, MONTH};
use crate::reports::{self, InventoryBins, InventoryItem};
use crate::segment::{self, SegmentParams, Segmentation};
use crate::types::RecordTable;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub profit: ProfitPolicy,
    pub forecast: ForecastStrategy,
    pub horizon: usize,
    pub period_column: String,
    pub segment: SegmentParams,
    pub inventory: InventoryBins,
    pub chart: ChartKind,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            profit: ProfitPolicy::default(),
            forecast: ForecastStrategy::default(),
            horizon: 0,
            period_column: MONTH.to_string(),
            segment: SegmentParams::default(),
            inventory: InventoryBins::default(),
            chart: ChartKind::Line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub table: RecordTable,
    pub load_report: LoadReport,
    pub settings: AnalysisSettings,
}

impl AnalysisContext {
    pub fn new(table: RecordTable, settings: AnalysisSettings) -> Self {
        Self {
            table,
            load_report: LoadReport::default(),
            settings,
        }
    }

    /// Load a CSV file, deriving columns with the configured profit policy.
    pub fn load(path: impl AsRef<Path>, settings: AnalysisSettings) -> anyhow::Result<Self> {
        let (table, load_report) = loader::load_and_clean(path, settings.profit)?;
        Ok(Self {
            table,
            load_report,
            settings,
        })
    }

    pub fn kpis(&self) -> AnalysisResult<KpiResult> {
        kpi::calculate_kpis(&self.table)
    }

    pub fn monthly_revenue(&self) -> AnalysisResult<Vec<(String, f64)>> {
        forecast::revenue_series(&self.table, &self.settings.period_column)
    }

    pub fn forecast(&self) -> AnalysisResult<Vec<ForecastPoint>> {
        forecast::forecast_revenue(
            &self.table,
            &self.settings.period_column,
            self.settings.forecast,
        )
    }

    /// Out-of-sample continuation of the revenue trend line.
    pub fn projection(&self) -> AnalysisResult<Vec<f64>> {
        let actual: Vec<f64> = self.monthly_revenue()?.into_iter().map(|(_, v)| v).collect();
        forecast::project(&actual, self.settings.horizon)
    }

    pub fn segments(&self) -> AnalysisResult<Segmentation> {
        segment::segment_customers(&self.table, &self.settings.segment)
    }

    pub fn inventory(&self) -> AnalysisResult<Vec<InventoryItem>> {
        reports::inventory_status(&self.table, &self.settings.inventory)
    }
}

/// Last-loaded context per caller. Each caller only ever sees its own slot;
/// a new upload replaces the previous one.
#[derive(Debug, Default)]
pub struct SessionCache {
    slots: HashMap<String, AnalysisContext>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, caller: &str, context: AnalysisContext) {
        debug!(caller, rows = context.table.len(), "caching table for caller");
        self.slots.insert(caller.to_string(), context);
    }

    pub fn get(&self, caller: &str) -> Option<&AnalysisContext> {
        self.slots.get(caller)
    }

    pub fn evict(&mut self, caller: &str) -> Option<AnalysisContext> {
        self.slots.remove(caller)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
