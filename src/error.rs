//! Error types for trmnl-health

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, summarizing or publishing tracker data
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Tracker source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tracker file has no parseable header: {0}")]
    MissingHeader(String),

    #[error("Failed to read tracker CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required configuration: {0}")]
    ConfigMissing(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Payload is {size} bytes after dropping optional cards (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("State file error at {}: {source}", path.display())]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HealthError {
    pub(crate) fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        HealthError::InvalidConfig {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
