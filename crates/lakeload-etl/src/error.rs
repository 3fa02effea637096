use lakeload_common::CommonError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Invalid job arguments: {0}")]
    Arguments(String),

    #[error("Secret '{name}' is unusable: {reason}")]
    InvalidSecret { name: String, reason: String },

    #[error("No schema is defined for table '{0}'")]
    UnknownTable(String),

    #[error("Catalog table {database}.{table} has no storage location")]
    MissingLocation { database: String, table: String },

    #[error("Invalid S3 location '{0}'")]
    InvalidLocation(String),

    #[error("No data objects under {location} for table {table}")]
    NoData { table: String, location: String },

    #[error("{service} error: {message}")]
    Provider {
        service: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl EtlError {
    pub fn provider(service: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            service,
            message: message.into(),
        }
    }
}
