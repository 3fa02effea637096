use crate::error::{EtlError, Result};
use aws_sdk_glue::{error::DisplayErrorContext, Client};
use tracing::{debug, instrument};

/// S3 location of a crawled catalog table
#[instrument(skip(client))]
pub async fn table_location(client: &Client, database: &str, table: &str) -> Result<String> {
    let output = client
        .get_table()
        .database_name(database)
        .name(table)
        .send()
        .await
        .map_err(|e| EtlError::provider("Glue", DisplayErrorContext(&e).to_string()))?;

    let location = output
        .table()
        .and_then(|t| t.storage_descriptor())
        .and_then(|sd| sd.location())
        .filter(|l| !l.is_empty())
        .ok_or_else(|| EtlError::MissingLocation {
            database: database.to_string(),
            table: table.to_string(),
        })?;

    debug!(location, "Resolved catalog table location");

    Ok(location.to_string())
}
