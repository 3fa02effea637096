//! Direct warehouse connection used for reconciliation
//!
//! A fresh connection is opened and closed for every count.

use super::Warehouse;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use lakeload_common::WarehouseSecret;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, instrument};

/// Longest identifier Redshift accepts
const MAX_IDENTIFIER_LEN: usize = 127;

pub struct RedshiftWarehouse {
    options: PgConnectOptions,
}

impl RedshiftWarehouse {
    pub fn new(secret: &WarehouseSecret) -> Result<Self> {
        Ok(Self {
            options: secret.connect_options()?,
        })
    }
}

#[async_trait]
impl Warehouse for RedshiftWarehouse {
    #[instrument(skip(self))]
    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = count_query(table)?;

        let mut conn = PgConnection::connect_with(&self.options).await?;
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut conn).await?;
        conn.close().await?;

        debug!(table, count, "Counted warehouse rows");

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

pub(crate) fn count_query(table: &str) -> Result<String> {
    if !is_valid_identifier(table) {
        return Err(PipelineError::invalid_input(format!(
            "'{}' is not a valid table name",
            table
        )));
    }
    Ok(format!("SELECT COUNT(*) FROM {}", table))
}

/// Unquoted SQL identifier: letter or underscore, then letters, digits, underscores
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("salesdata"));
        assert!(is_valid_identifier("_fx_table2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2024_sales"));
        assert!(!is_valid_identifier("sales; DROP TABLE users"));
        assert!(!is_valid_identifier("sales-data"));
        assert!(!is_valid_identifier(&"a".repeat(128)));
    }

    #[test]
    fn test_count_query() {
        assert_eq!(count_query("customer_table").unwrap(), "SELECT COUNT(*) FROM customer_table");
        assert!(matches!(
            count_query("bad name"),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
