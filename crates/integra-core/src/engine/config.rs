use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// How much checking an evaluation performs.
///
/// `Usage` validates caller input (unknown ids, mismatched lengths, non-finite
/// scores). `Internal` additionally runs the access verifier on the first
/// evaluation of every model generation and checks derivatives for non-finite
/// values after each derivative pass. Verification never changes the outcome
/// of a correct evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    None,
    Usage,
    Internal,
}

impl Default for VerificationLevel {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            VerificationLevel::Internal
        } else {
            VerificationLevel::Usage
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub verification: VerificationLevel,
    pub gather_statistics: bool,
    /// Global score budget for early-exit evaluation.
    pub maximum_score: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            verification: VerificationLevel::default(),
            gather_statistics: false,
            maximum_score: f64::MAX,
        }
    }
}

impl EvaluationConfig {
    pub fn builder() -> EvaluationConfigBuilder {
        EvaluationConfigBuilder::new()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<string>")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maximum_score.is_nan() {
            return Err(ConfigError::InvalidValue {
                parameter: "maximum_score",
                reason: "must not be NaN".to_string(),
            });
        }
        Ok(())
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Default)]
pub struct EvaluationConfigBuilder {
    verification: Option<VerificationLevel>,
    gather_statistics: Option<bool>,
    maximum_score: Option<f64>,
}

impl EvaluationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verification(mut self, level: VerificationLevel) -> Self {
        self.verification = Some(level);
        self
    }
    pub fn gather_statistics(mut self, enabled: bool) -> Self {
        self.gather_statistics = Some(enabled);
        self
    }
    pub fn maximum_score(mut self, score: f64) -> Self {
        self.maximum_score = Some(score);
        self
    }

    pub fn build(self) -> Result<EvaluationConfig, ConfigError> {
        let defaults = EvaluationConfig::default();
        let config = EvaluationConfig {
            verification: self.verification.unwrap_or(defaults.verification),
            gather_statistics: self.gather_statistics.unwrap_or(defaults.gather_statistics),
            maximum_score: self.maximum_score.unwrap_or(defaults.maximum_score),
        };
        config.validate()?;
        Ok(config)
    }
}
