use super::config::ConfigError;
use crate::core::models::error::ModelError;
use crate::core::models::ids::{ObjectId, ParticleId};
use crate::core::scoring::error::ScoringError;
use std::fmt;
use thiserror::Error;

/// Kind of attribute access that tripped the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Read => "read",
            Access::Write => "write",
        })
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error(
        "Undeclared {access} of particle '{particle_name}' by {caller}; declared {access} set: [{}]",
        .declared.join(", ")
    )]
    AccessViolation {
        particle: ParticleId,
        particle_name: String,
        access: Access,
        caller: String,
        declared: Vec<String>,
    },

    #[error("Non-finite value {value} in {context}")]
    Numeric { value: f64, context: String },

    #[error("Dependency graph contains a cycle through {} object(s): {cycle:?}", .cycle.len())]
    CyclicDependency { cycle: Vec<ObjectId> },

    #[error("Internal logic error: {0}")]
    Internal(String),

    #[error("Scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },

    #[error("Model error: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}

impl EvalError {
    pub fn is_access_violation(&self) -> bool {
        matches!(self, EvalError::AccessViolation { .. })
    }
}
