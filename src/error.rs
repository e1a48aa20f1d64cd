//! Error types for the signal engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Window shorter than the analyzer's `min_data_points`
    #[error("Insufficient data: need {need} points, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid analyzer configuration: {0}")]
    Configuration(String),

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Unknown analyzer: {0}")]
    UnknownAnalyzer(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_setting(key: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors that are part of normal operation and should not be surfaced
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }
}
