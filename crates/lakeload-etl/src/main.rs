//! lakeload ETL - job entry point

use anyhow::Result;
use lakeload_common::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use lakeload_etl::{job, JobArgs};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Runtime logs are collected line by line, so default to JSON
    let log_config = LogConfig::builder()
        .level(LogLevel::Info)
        .format(LogFormat::Json)
        .log_file_prefix("lakeload-etl")
        .build()
        .with_env_overrides(|k| std::env::var(k).ok())?;

    let _guard = init_logging(&log_config)?;

    let args = JobArgs::from_env()?;
    info!(secret = %args.secret_name, database = %args.database, "Resolved job arguments");

    let report = job::run(&args).await?;
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}
