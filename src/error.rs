//! Error types for Metabolic Flux

use thiserror::Error;

/// Errors that can occur during storage access or computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Event store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
