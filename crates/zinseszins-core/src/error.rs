use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single finding from a configuration validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid configuration ({} issue(s)): {}", .0.len(), join_issues(.0))]
    InvalidConfiguration(Vec<ValidationIssue>),

    #[error("Missing rate data for year {year}")]
    MissingRateData { year: i32 },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EngineError {
    /// Wrap a non-empty issue list; an empty list is not an error.
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Result<(), EngineError> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidConfiguration(issues))
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}
