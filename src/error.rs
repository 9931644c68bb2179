//! Error types for Mindful Pulse

use thiserror::Error;

/// Errors that can occur while sampling, scoring or persisting sessions
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to load resource: {0}")]
    ResourceLoadFailure(String),

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    /// Stable machine-readable code, used by the CLI and FFI error reports
    pub fn code(&self) -> &'static str {
        match self {
            PulseError::PermissionDenied(_) => "PERMISSION_DENIED",
            PulseError::ResourceLoadFailure(_) => "RESOURCE_LOAD_FAILURE",
            PulseError::AuthenticationRequired(_) => "AUTHENTICATION_REQUIRED",
            PulseError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            PulseError::InvalidState(_) => "INVALID_STATE",
            PulseError::ParseError(_) => "PARSE_ERROR",
            PulseError::JsonError(_) => "JSON_ERROR",
            PulseError::ConfigError(_) => "CONFIG_ERROR",
            PulseError::Io(_) => "IO_ERROR",
        }
    }
}
