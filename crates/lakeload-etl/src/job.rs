//! The job body

use crate::args::JobArgs;
use crate::catalog::table_location;
use crate::error::Result;
use crate::load::{load_statements, reload_table};
use crate::schema::select_tables;
use crate::secret::fetch_secret;
use crate::staging::{S3Location, Staging};
use lakeload_common::aws::default_sdk_config;
use serde::Serialize;
use sqlx::{Connection, PgConnection};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub source: String,
    pub partitions: usize,
    pub objects: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub run_id: String,
    pub tables: Vec<TableLoad>,
}

/// Reload the selected tables in schema order, stopping at the first failure
pub async fn run(args: &JobArgs) -> Result<JobReport> {
    let run_id = Uuid::new_v4().to_string();
    let staging_root = S3Location::parse(&args.redshift_tmp_dir)?;
    let selected = select_tables(&args.tables)?;
    info!(run_id = %run_id, database = %args.database, "ETL job started");

    let sdk_config = default_sdk_config(&args.secret_region).await;
    let secrets = aws_sdk_secretsmanager::Client::new(&sdk_config);
    let glue = aws_sdk_glue::Client::new(&sdk_config);
    let staging = Staging::new(aws_sdk_s3::Client::new(&sdk_config));

    let secret = fetch_secret(&secrets, &args.secret_name).await?;
    info!(warehouse = %secret.jdbc_url(), "Connecting to warehouse");
    let mut conn = PgConnection::connect_with(&secret.connect_options()?).await?;

    let mut tables = Vec::with_capacity(selected.len());

    for (table, definition) in selected {
        let source = S3Location::parse(&table_location(&glue, &args.database, table).await?)?;
        let staged = staging
            .stage_table(&source, &staging_root, table, &run_id)
            .await?;

        let statements = load_statements(table, definition, &staged, &args.redshift_iam_role);
        let loaded = reload_table(&mut conn, table, &statements).await;

        // Staged copies go away whether or not the load succeeded
        if let Err(e) = staging.cleanup(&staging_root.bucket, &staged).await {
            warn!(table, error = %e, "Failed to remove staged objects");
        }
        loaded?;

        tables.push(TableLoad {
            table: table.to_string(),
            source: source.uri(),
            partitions: staged.len(),
            objects: staged.iter().map(|p| p.copies.len()).sum(),
        });
    }

    conn.close().await?;
    info!(run_id = %run_id, tables = tables.len(), "ETL job finished");

    Ok(JobReport { run_id, tables })
}
