use crate::error::{AnalysisError, AnalysisResult};
use crate::util::{parse_date_safe, parse_f64_safe};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tabled::Tabled;
use tracing::warn;

/// One cell of a [`RecordTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Missing,
}

impl Value {
    /// Type a raw CSV cell: numbers first, then dates, then free text.
    /// Blank cells are `Missing`.
    pub fn parse(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        if let Some(n) = parse_f64_safe(Some(trimmed)) {
            return Value::Number(n);
        }
        if let Some(d) = parse_date_safe(Some(trimmed)) {
            return Value::Date(d);
        }
        Value::Text(trimmed.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Text,
    Number,
    Date,
}

/// A named column. Its kind is inferred once, from every non-missing cell.
///
/// Each cell keeps its trimmed source text next to the typed value, so
/// identifiers such as `00123` or 17-digit account numbers group by what
/// the file said, not by their `f64` rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<Value>,
    raw: Vec<String>,
}

impl Column {
    /// Column of computed values; the source text is the value's rendering.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let raw = values.iter().map(Value::to_string).collect();
        Self::with_raw(name, values, raw)
    }

    /// Type raw CSV cells, keeping their trimmed text.
    pub fn from_cells<S: AsRef<str>>(name: impl Into<String>, cells: &[S]) -> Self {
        let raw: Vec<String> = cells.iter().map(|c| c.as_ref().trim().to_string()).collect();
        let values = raw.iter().map(|c| Value::parse(c)).collect();
        Self::with_raw(name, values, raw)
    }

    fn with_raw(name: impl Into<String>, values: Vec<Value>, raw: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: infer_kind(&values),
            values,
            raw,
        }
    }

    /// Group key of each cell: the source text, `None` where missing.
    pub fn keys(&self) -> Vec<Option<String>> {
        self.values
            .iter()
            .zip(&self.raw)
            .map(|(v, raw)| (!v.is_missing()).then(|| raw.clone()))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn infer_kind(values: &[Value]) -> ColumnKind {
    let mut present = values.iter().filter(|v| !v.is_missing()).peekable();
    if present.peek().is_none() {
        return ColumnKind::Text;
    }
    let mut numeric = true;
    let mut dated = true;
    for v in present {
        numeric &= matches!(v, Value::Number(_));
        dated &= matches!(v, Value::Date(_));
    }
    if numeric {
        ColumnKind::Number
    } else if dated {
        ColumnKind::Date
    } else {
        ColumnKind::Text
    }
}

/// In-memory sales table: ordered, named, typed columns of equal length.
///
/// Built once per uploaded file and only borrowed by the analyses. Derived
/// columns are added through [`RecordTable::set_column`] by the loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    columns: Vec<Column>,
    rows: usize,
}

impl RecordTable {
    /// Build a table from a header row and raw text rows. Short rows are
    /// padded with `Missing`; extra trailing cells are ignored. A repeated
    /// header keeps its first occurrence.
    pub fn from_rows<H, C>(headers: &[H], rows: &[Vec<C>]) -> Self
    where
        H: AsRef<str>,
        C: AsRef<str>,
    {
        let mut table = RecordTable {
            columns: Vec::with_capacity(headers.len()),
            rows: rows.len(),
        };
        for (idx, header) in headers.iter().enumerate() {
            let name = header.as_ref().trim();
            if table.has_column(name) {
                warn!(column = name, "duplicate column header ignored");
                continue;
            }
            let cells: Vec<&str> = rows
                .iter()
                .map(|row| row.get(idx).map(|c| c.as_ref()).unwrap_or(""))
                .collect();
            table.columns.push(Column::from_cells(name, &cells));
        }
        table
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Add a column, replacing any column of the same name in place.
    /// `values` must have one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows, "column '{}' has wrong length", name);
        let column = Column::new(name, values);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    fn require(&self, name: &str) -> AnalysisResult<&Column> {
        self.column(name)
            .ok_or_else(|| AnalysisError::MissingColumns(vec![name.to_string()]))
    }

    /// Numeric view of a column. Missing cells are `None`; any text or date
    /// cell is a `NonNumericValue` error (rows are numbered from 1).
    pub fn numbers(&self, name: &str) -> AnalysisResult<Vec<Option<f64>>> {
        let column = self.require(name)?;
        column
            .values
            .iter()
            .enumerate()
            .map(|(row, v)| match v {
                Value::Number(n) => Ok(Some(*n)),
                Value::Missing => Ok(None),
                other => Err(AnalysisError::NonNumericValue {
                    column: name.to_string(),
                    row: row + 1,
                    value: other.to_string(),
                }),
            })
            .collect()
    }

    /// Numeric view that turns anything non-numeric into `None`.
    pub fn numbers_lenient(&self, name: &str) -> AnalysisResult<Vec<Option<f64>>> {
        let column = self.require(name)?;
        Ok(column.values.iter().map(Value::as_f64).collect())
    }

    /// Group keys of a column as written in the file; `None` where the cell
    /// is missing.
    pub fn keys(&self, name: &str) -> AnalysisResult<Vec<Option<String>>> {
        let column = self.require(name)?;
        Ok(column.keys())
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KpiRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupTotalRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ForecastRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Actual")]
    #[tabled(rename = "Actual")]
    pub actual: String,
    #[serde(rename = "Forecast")]
    #[tabled(rename = "Forecast")]
    pub forecast: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SegmentRow {
    #[serde(rename = "Customer")]
    #[tabled(rename = "Customer")]
    pub customer: String,
    #[serde(rename = "Features")]
    #[tabled(rename = "Features")]
    pub features: String,
    #[serde(rename = "Segment")]
    #[tabled(rename = "Segment")]
    pub segment: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct InventoryRow {
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "Quantity Sold")]
    #[tabled(rename = "Quantity Sold")]
    pub quantity_sold: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
}
