use crate::core::models::error::ModelError;
use thiserror::Error;

/// Failures reported by score state and restraint implementations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Model access failed: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Non-finite value {value} produced by {context}")]
    NonFinite { value: f64, context: String },

    #[error("'{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

impl ScoringError {
    pub fn failed(name: &str, reason: impl Into<String>) -> Self {
        ScoringError::Failed {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
