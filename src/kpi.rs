// KPI aggregation over a whole `RecordTable`.
//
// All functions are pure. Group results keep first-seen group order, so a
// month column read from a chronologically sorted file stays chronological.
use crate::error::{AnalysisError, AnalysisResult};
use crate::loader::{MONTH, PRODUCT, PROFIT, REVENUE};
use crate::schema::{require_numeric, validate, KPI_COLUMNS};
use crate::types::{KpiRow, RecordTable};
use crate::util::{average, format_number};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiResult {
    pub total_revenue: f64,
    pub total_profit: f64,
    pub average_monthly_sales: f64,
    pub top_product: String,
}

impl KpiResult {
    /// Metric name → display value, in presentation order.
    pub fn rows(&self) -> Vec<KpiRow> {
        vec![
            KpiRow {
                metric: "Total Revenue".to_string(),
                value: format_number(self.total_revenue, 2),
            },
            KpiRow {
                metric: "Total Profit".to_string(),
                value: format_number(self.total_profit, 2),
            },
            KpiRow {
                metric: "Avg Monthly Sales".to_string(),
                value: format_number(self.average_monthly_sales, 2),
            },
            KpiRow {
                metric: "Top Product".to_string(),
                value: self.top_product.clone(),
            },
        ]
    }
}

/// Sum of a numeric column. Blank cells are skipped.
pub fn total(table: &RecordTable, column: &str) -> AnalysisResult<f64> {
    let values = table.numbers(column)?;
    if table.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(values.into_iter().flatten().sum())
}

/// Per-group sums of `value`, in first-seen group order. Rows without a
/// group key are skipped.
pub fn grouped_sum(
    table: &RecordTable,
    group: &str,
    value: &str,
) -> AnalysisResult<Vec<(String, f64)>> {
    let keys = table.keys(group)?;
    let values = table.numbers(value)?;
    if table.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    let mut order: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (key, v) in keys.into_iter().zip(values) {
        let Some(key) = key else { continue };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            order.push((key, 0.0));
            order.len() - 1
        });
        order[slot].1 += v.unwrap_or(0.0);
    }
    if order.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(order)
}

/// Mean of the per-group sums (not the mean of rows).
pub fn mean_of_grouped_sums(table: &RecordTable, group: &str, value: &str) -> AnalysisResult<f64> {
    let sums: Vec<f64> = grouped_sum(table, group, value)?
        .into_iter()
        .map(|(_, s)| s)
        .collect();
    Ok(average(&sums))
}

/// Group with the largest sum. Ties go to the lexically smallest key.
pub fn argmax_group(table: &RecordTable, group: &str, value: &str) -> AnalysisResult<String> {
    let mut sums = grouped_sum(table, group, value)?;
    sums.sort_by(|a, b| a.0.cmp(&b.0));
    let mut best = &sums[0];
    for candidate in &sums[1..] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    Ok(best.0.clone())
}

pub fn calculate_kpis(table: &RecordTable) -> AnalysisResult<KpiResult> {
    validate(table, &KPI_COLUMNS)?;
    require_numeric(table, REVENUE)?;
    require_numeric(table, PROFIT)?;
    if table.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    let result = KpiResult {
        total_revenue: total(table, REVENUE)?,
        total_profit: total(table, PROFIT)?,
        average_monthly_sales: mean_of_grouped_sums(table, MONTH, REVENUE)?,
        top_product: argmax_group(table, PRODUCT, REVENUE)?,
    };
    debug!(?result, "computed KPIs");
    Ok(result)
}
