//! Error types for ragpipe

use crate::pipeline::{Operation, Stage};
use thiserror::Error;

/// Result type alias using RagPipeError
pub type Result<T> = std::result::Result<T, RagPipeError>;

/// Error type alias for convenience
pub type Error = RagPipeError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for ragpipe
#[derive(Debug, Error)]
pub enum RagPipeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("Stream ended without completion")]
    StreamIncomplete,

    #[error("Cannot {operation} while in the {stage} stage")]
    InvalidStage { operation: Operation, stage: Stage },

    #[error("Pipeline busy: {0} in progress")]
    Busy(Operation),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RagPipeError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidInput(_) | Self::Yaml(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// Whether the error came from talking to the remote service
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::ExternalError(_) | Self::StreamIncomplete
        )
    }
}
