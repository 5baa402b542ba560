//! Error types for the TSAE SDK.

use crate::network::NetworkError;
use thiserror::Error;

/// Error type for SDK operations.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Periodic sessions are already running")]
    AlreadyRunning,

    #[error("Periodic sessions are not running")]
    NotRunning,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
