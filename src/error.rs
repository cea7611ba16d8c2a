//! Error types for building overhead reports.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a single report.
///
/// All variants are fatal for the report being generated: no partial ratio
/// table is returned and no chart file is left behind.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The baseline condition has no measurement for a requested category.
    #[error("baseline '{baseline}' has no measurement for category '{category}'")]
    MissingBaseline { baseline: String, category: String },

    /// The baseline measurement is zero or negative, so no ratio can be formed.
    #[error("baseline '{baseline}' value for category '{category}' is {value}, expected > 0")]
    DivisionByZero {
        baseline: String,
        category: String,
        value: f64,
    },

    /// A category was requested more than once.
    #[error("category '{0}' is listed more than once")]
    DuplicateCategory(String),

    /// A non-baseline condition lacks a category the report asks for.
    #[error("condition '{condition}' has no measurement for category '{category}'")]
    MissingMeasurement { condition: String, category: String },

    /// The chart could not be committed to its destination.
    #[error("failed to write chart to {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A measurement is negative or not a finite number.
    #[error("invalid measurement for ({condition}, {category}): {value}")]
    InvalidValue {
        condition: String,
        category: String,
        value: f64,
    },

    /// A column named by the input layout is absent from the header row.
    #[error("column '{column}' not found in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// A measurement cell did not parse as a number.
    #[error("line {line}, column '{column}': '{value}' is not a number")]
    InvalidNumber {
        line: u64,
        column: String,
        value: String,
    },

    /// Nothing to draw.
    #[error("chart has no {0} to draw")]
    EmptyChart(&'static str),

    /// The plotting backend failed while drawing or encoding.
    #[error("render failed: {0}")]
    Render(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ReportError {
    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ReportError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
