//! Error types for the lakeload orchestrator
//!
//! Variants follow the failure classes of a run: configuration, validation,
//! control-plane, terminal remote failures, timeouts and reconciliation.
//! Messages are user-facing and say what to check next.

use lakeload_common::CommonError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required environment variable is absent or blank
    #[error("Missing required environment variable {0}. Set it in the environment or in a .env file.")]
    MissingEnv(String),

    /// An environment variable is present but unusable
    #[error("Invalid value for {name}: {reason}")]
    InvalidEnv { name: String, reason: String },

    #[error("File not found: '{0}'. Verify the path exists and is readable.")]
    FileNotFound(String),

    /// Malformed call arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CloudFormation template validation failed: {0}")]
    TemplateValidation(String),

    #[error("Stack '{0}' does not exist. Run 'lakeload deploy' first.")]
    StackNotFound(String),

    #[error("Stack output '{0}' not found. Check the Outputs section of the template.")]
    MissingOutput(String),

    #[error("Stack '{stack}' creation failed: {reason}")]
    StackCreationFailed { stack: String, reason: String },

    #[error("Crawler '{crawler}' failed: {reason}")]
    CrawlerFailed { crawler: String, reason: String },

    #[error("Run '{run_id}' of job '{job}' failed: {reason}")]
    JobRunFailed {
        job: String,
        run_id: String,
        reason: String,
    },

    #[error(
        "Timed out after {}s waiting for {operation} (limit {}s)",
        .waited.as_secs(),
        .limit.as_secs()
    )]
    Timeout {
        operation: String,
        waited: Duration,
        limit: Duration,
    },

    #[error("Row count mismatch for table '{table}': {local} rows in CSV, {warehouse} rows in warehouse")]
    RowCountMismatch {
        table: String,
        local: u64,
        warehouse: u64,
    },

    /// Any control-plane error not classified above
    #[error("{service} error: {message}")]
    Provider {
        service: &'static str,
        message: String,
    },

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Warehouse error: {0}. Check the REDSHIFT_* connection settings.")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl PipelineError {
    pub fn provider(service: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            service,
            message: message.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_env(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_reports_seconds() {
        let err = PipelineError::Timeout {
            operation: "crawler 'sales'".to_string(),
            waited: Duration::from_secs(90),
            limit: Duration::from_secs(100),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 90s waiting for crawler 'sales' (limit 100s)"
        );
    }

    #[test]
    fn test_missing_env_names_variable() {
        let err = PipelineError::MissingEnv("STACK_NAME".to_string());
        assert!(err.to_string().contains("STACK_NAME"));
    }
}
