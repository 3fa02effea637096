//! Error types shared across lakeload crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid warehouse secret: {0}")]
    InvalidSecret(String),

    #[error("Invalid warehouse port '{0}': expected an integer between 1 and 65535")]
    InvalidPort(String),
}
