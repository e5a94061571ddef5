// CSV ingestion: raw delimited text in, typed `RecordTable` out.
//
// Loading happens once per file. The derived columns (`Month`, `Revenue`,
// `Profit`) are added here so every analysis sees the same table.
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{RecordTable, Value};
use crate::util::month_name;
use anyhow::Context;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DATE: &str = "Date";
pub const MONTH: &str = "Month";
pub const PRODUCT: &str = "Product";
pub const CUSTOMER: &str = "Customer";
pub const CUSTOMER_EMAIL: &str = "Customer Email";
pub const QUANTITY_SOLD: &str = "Quantity Sold";
pub const UNITS_SOLD: &str = "Units Sold";
pub const PRICE: &str = "Price";
pub const REVENUE: &str = "Revenue";
pub const PROFIT: &str = "Profit";
pub const COST: &str = "Cost";

/// How a missing `Profit` column is derived. Chosen by the caller, never
/// guessed from which columns happen to be present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ProfitPolicy {
    /// `Profit = Revenue * rate`.
    FixedMargin {
        #[serde(default = "default_margin")]
        rate: f64,
    },
    /// `Profit = Revenue - Cost`; requires a `Cost` column.
    CostBased,
}

impl Default for ProfitPolicy {
    fn default() -> Self {
        ProfitPolicy::FixedMargin {
            rate: default_margin(),
        }
    }
}

fn default_margin() -> f64 {
    0.2
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub parse_errors: usize,
    pub columns: Vec<String>,
    pub derived: Vec<String>,
    pub undated_rows: usize,
}

pub fn load_and_clean(
    path: impl AsRef<Path>,
    policy: ProfitPolicy,
) -> anyhow::Result<(RecordTable, LoadReport)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open sales file: {}", path.display()))?;
    let (table, report) = load_from_reader(file, policy)
        .with_context(|| format!("Failed to load sales file: {}", path.display()))?;
    info!(
        path = %path.display(),
        rows = report.total_rows,
        skipped = report.parse_errors,
        "loaded sales table"
    );
    Ok((table, report))
}

/// Parse CSV text from any reader (an uploaded body, a file, a test string).
pub fn load_from_reader<R: Read>(
    reader: R,
    policy: ProfitPolicy,
) -> anyhow::Result<(RecordTable, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("CSV has no header row")?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut parse_errors = 0usize;
    for result in rdr.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => {
                debug!(error = %e, "skipping unreadable CSV record");
                parse_errors += 1;
            }
        }
    }

    let mut table = RecordTable::from_rows(&headers, &rows);
    let derived = derive_columns(&mut table, policy)?;
    let undated_rows = table
        .column(MONTH)
        .map(|c| c.values().iter().filter(|v| v.is_missing()).count())
        .unwrap_or(0);

    let report = LoadReport {
        total_rows: table.len(),
        parse_errors,
        columns: table.column_names().iter().map(|s| s.to_string()).collect(),
        derived,
        undated_rows,
    };
    Ok((table, report))
}

/// Add `Month`, `Revenue` and `Profit` when the file does not supply them.
/// Returns the names of the columns that were added.
pub fn derive_columns(
    table: &mut RecordTable,
    policy: ProfitPolicy,
) -> AnalysisResult<Vec<String>> {
    let mut derived = Vec::new();

    if !table.has_column(MONTH) {
        if let Some(dates) = table.column(DATE) {
            let months: Vec<Value> = dates
                .values()
                .iter()
                .map(|v| match v.as_date() {
                    Some(d) => Value::Text(month_name(d)),
                    None => Value::Missing,
                })
                .collect();
            let unparsed = months.iter().filter(|v| v.is_missing()).count();
            if unparsed > 0 {
                warn!(rows = unparsed, "rows without a parseable Date have no Month");
            }
            table.set_column(MONTH, months);
            derived.push(MONTH.to_string());
        }
    }

    if !table.has_column(REVENUE) {
        let quantity = [QUANTITY_SOLD, UNITS_SOLD]
            .into_iter()
            .find(|c| table.has_column(c));
        if let (Some(quantity), true) = (quantity, table.has_column(PRICE)) {
            let q = table.numbers_lenient(quantity)?;
            let p = table.numbers_lenient(PRICE)?;
            let revenue = q
                .iter()
                .zip(&p)
                .map(|(q, p)| match (q, p) {
                    (Some(q), Some(p)) => Value::Number(q * p),
                    _ => Value::Missing,
                })
                .collect();
            table.set_column(REVENUE, revenue);
            derived.push(REVENUE.to_string());
        }
    }

    if !table.has_column(PROFIT) && table.has_column(REVENUE) {
        let revenue = table.numbers_lenient(REVENUE)?;
        let profit: Vec<Value> = match policy {
            ProfitPolicy::FixedMargin { rate } => revenue
                .iter()
                .map(|r| r.map_or(Value::Missing, |r| Value::Number(r * rate)))
                .collect(),
            ProfitPolicy::CostBased => {
                if !table.has_column(COST) {
                    return Err(AnalysisError::MissingColumns(vec![COST.to_string()]));
                }
                let cost = table.numbers_lenient(COST)?;
                revenue
                    .iter()
                    .zip(&cost)
                    .map(|(r, c)| match (r, c) {
                        (Some(r), Some(c)) => Value::Number(r - c),
                        _ => Value::Missing,
                    })
                    .collect()
            }
        };
        table.set_column(PROFIT, profit);
        derived.push(PROFIT.to_string());
    }

    debug!(?derived, "derived columns");
    Ok(derived)
}
