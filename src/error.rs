//! Error types for loading and validating feedback data.
//!
//! The analysis functions themselves never fail; errors only come from the
//! boundary where raw rows, configuration files and stores are read.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    /// A required field is missing or malformed
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown understanding level '{0}'")]
    UnknownLevel(String),

    #[error("unknown feedback reason '{0}'")]
    UnknownReason(String),

    /// Configuration values that cannot be used together
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("course '{0}' not found")]
    CourseNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl InsightError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        InsightError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
