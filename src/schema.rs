// Column preconditions for each analysis.
//
// Checks run before any aggregation and never touch the table. A failed check
// names every missing column so the caller can report it as is.
use crate::error::{AnalysisError, AnalysisResult};
use crate::loader::{MONTH, PRODUCT, PROFIT, QUANTITY_SOLD, REVENUE};
use crate::types::{RecordTable, Value};

pub const KPI_COLUMNS: [&str; 4] = [REVENUE, PROFIT, MONTH, PRODUCT];
pub const FORECAST_COLUMNS: [&str; 2] = [MONTH, REVENUE];
pub const INVENTORY_COLUMNS: [&str; 2] = [PRODUCT, QUANTITY_SOLD];

/// Required columns absent from `table`, in the order they were requested.
pub fn missing_columns(table: &RecordTable, required: &[&str]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for name in required {
        if !table.has_column(name) && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

pub fn validate(table: &RecordTable, required: &[&str]) -> AnalysisResult<()> {
    let missing = missing_columns(table, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::MissingColumns(missing))
    }
}

/// The column exists and holds only numbers (or blanks).
pub fn require_numeric(table: &RecordTable, column: &str) -> AnalysisResult<()> {
    validate(table, &[column])?;
    let offending = table.column(column).and_then(|c| {
        c.values()
            .iter()
            .enumerate()
            .find(|(_, v)| !matches!(v, Value::Number(_) | Value::Missing))
    });
    match offending {
        Some((row, value)) => Err(AnalysisError::NonNumericValue {
            column: column.to_string(),
            row: row + 1,
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RecordTable {
        RecordTable::from_rows(
            &["Month", "Product", "Revenue"],
            &[vec!["Jan", "A", "100"], vec!["Feb", "B", "oops"]],
        )
    }

    #[test]
    fn kpi_without_profit_reports_it() {
        assert_eq!(
            validate(&table(), &KPI_COLUMNS),
            Err(AnalysisError::MissingColumns(vec!["Profit".into()]))
        );
    }

    #[test]
    fn every_missing_column_is_listed_once() {
        let missing = missing_columns(&table(), &["Customer", "Revenue", "Customer", "Cost"]);
        assert_eq!(missing, vec!["Customer", "Cost"]);
    }

    #[test]
    fn present_columns_validate() {
        assert_eq!(validate(&table(), &FORECAST_COLUMNS), Ok(()));
    }

    #[test]
    fn numeric_check_points_at_first_bad_cell() {
        assert_eq!(
            require_numeric(&table(), "Revenue"),
            Err(AnalysisError::NonNumericValue {
                column: "Revenue".into(),
                row: 2,
                value: "oops".into(),
            })
        );
        assert!(require_numeric(&table(), "Month").is_err());
    }
}
