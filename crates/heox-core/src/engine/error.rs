use super::config::ConfigError;
use crate::core::forcefield::evaluator::EvaluatorError;
use crate::core::io::xyz::XyzError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Energy evaluation failed: {source}")]
    Evaluator {
        #[from]
        source: EvaluatorError,
    },

    #[error("Trajectory output failed: {source}")]
    Trajectory {
        #[from]
        source: XyzError,
    },

    #[error("Failed to write log records: {0}")]
    Records(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Validation(err.to_string())
    }
}
