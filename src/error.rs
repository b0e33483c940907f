use std::path::PathBuf;
use thiserror::Error;

/// Failures that callers of the cleaning modules tell apart.
///
/// Modules return these inside `anyhow::Error`; use
/// `err.downcast_ref::<CleanError>()` to match on the kind.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Error parsing file: {0}")]
    Parse(String),

    #[error("Columns not found: {0:?}")]
    ColumnsNotFound(Vec<String>),

    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    #[error("Column '{0}' is not text type")]
    NotText(String),

    #[error("Column '{0}' contains missing values; impute it before using this method")]
    MissingValues(String),

    #[error("Invalid parameters for {module}: {reason}")]
    InvalidParams { module: String, reason: String },
}

impl CleanError {
    pub fn invalid_params(module: &str, reason: impl ToString) -> Self {
        Self::InvalidParams {
            module: module.to_string(),
            reason: reason.to_string(),
        }
    }
}
