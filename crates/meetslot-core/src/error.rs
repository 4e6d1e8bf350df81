//! Core error types for meetslot-core.
//!
//! Collaborator failures (calendar provider, ranking advisor) are
//! degraded rather than propagated -- they surface here only when a
//! caller needs to distinguish them. Input errors reject a request
//! before any scheduling is attempted.

use thiserror::Error;

/// Core error type for meetslot-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Request rejected before entering the engine
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// Calendar provider errors (degraded to empty calendars upstream)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured rejection of a malformed meeting request.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No participants in request")]
    NoParticipants,

    #[error("Duration {minutes} minutes outside allowed range [{min}, {max}]")]
    DurationOutOfRange { minutes: i64, min: i64, max: i64 },

    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange { start: String, end: String },
}

/// Calendar provider errors. The engine treats any of these as "no data
/// for this participant", never as a fatal request error.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Provider returned malformed payload: {0}")]
    Decode(String),

    #[error("Not authorized for {participant}")]
    NotAuthorized { participant: String },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: std::path::PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: std::path::PathBuf, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
