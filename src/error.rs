//! Error types for jatos-stim

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the analysis pipeline
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Survey export missing, unreadable, or lacking its join-key column
    #[error("Failed to load survey {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// None of the stimulus-identifying columns exist in a trial table
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed delimited text
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No participants with stimulus trials found")]
    NoQualifyingData,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AnalysisError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
