// Error taxonomy for the analytics core.
//
// Every failure is a returned outcome naming the precondition that did not
// hold. Callers decide how to recover (e.g. ask for a different file).
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no rows to aggregate")]
    EmptyInput,

    #[error("need at least {needed} periods to forecast, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("need at least {needed} distinct entities to form {needed} segments, found {found}")]
    InsufficientEntities { needed: usize, found: usize },

    #[error("unknown chart kind '{0}' (expected bar, line or pie)")]
    InvalidChartKind(String),

    #[error("column '{column}' row {row}: expected a number, found '{value}'")]
    NonNumericValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("rolling window must be at least 1, got {0}")]
    InvalidWindow(usize),

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("chart rendering failed: {0}")]
    Render(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
