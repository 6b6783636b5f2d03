use crate::types::SeriesId;
use thiserror::Error;

pub type ForgeResult<T> = Result<T, ForgeError>;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Cannot parse formula '{formula}': {message}")]
    Parse { formula: String, message: String },

    #[error("Sample formulas of {series} differ in structure: {detail}")]
    StructuralMismatch { series: SeriesId, detail: String },

    #[error("Generic formula for {series} does not reproduce its sample: expected '{expected}', got '{actual}'")]
    VerificationFailure {
        series: SeriesId,
        expected: String,
        actual: String,
    },

    #[error(
        "Reference '{reference}' on sheet '{sheet}' does not resolve to any series{}",
        unresolved_site(.series, .row, .formula)
    )]
    UnresolvedSeriesReference {
        sheet: String,
        reference: String,
        series: Option<SeriesId>,
        row: Option<usize>,
        formula: Option<String>,
    },

    #[error("Evaluation of {series} at row {row} failed for '{formula}': {message}")]
    Evaluation {
        series: SeriesId,
        row: usize,
        formula: String,
        message: String,
    },

    #[error("Workbooks are not compatible: {0}")]
    Compatibility(String),

    #[error("Workbooks differ: {0}")]
    Equivalence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ForgeError {
    /// A range operand that names no series, before its series is known
    pub fn unresolved(sheet: impl Into<String>, reference: impl Into<String>) -> Self {
        ForgeError::UnresolvedSeriesReference {
            sheet: sheet.into(),
            reference: reference.into(),
            series: None,
            row: None,
            formula: None,
        }
    }

    /// Attach the series, data row and formula text to an unresolved reference
    /// that does not carry them yet. Other errors pass through unchanged.
    pub fn in_series(self, id: &SeriesId, row: usize, formula: &str) -> Self {
        match self {
            ForgeError::UnresolvedSeriesReference {
                sheet,
                reference,
                series: None,
                ..
            } => ForgeError::UnresolvedSeriesReference {
                sheet,
                reference,
                series: Some(id.clone()),
                row: Some(row),
                formula: Some(formula.to_string()),
            },
            other => other,
        }
    }

    /// Failures that only degrade the affected series instead of aborting the run.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ForgeError::StructuralMismatch { .. }
                | ForgeError::VerificationFailure { .. }
                | ForgeError::Parse { .. }
        )
    }
}

fn unresolved_site(
    series: &Option<SeriesId>,
    row: &Option<usize>,
    formula: &Option<String>,
) -> String {
    match (series, row, formula) {
        (Some(series), Some(row), Some(formula)) => {
            format!(" (in {} at row {}: '{}')", series, row, formula)
        }
        _ => String::new(),
    }
}
