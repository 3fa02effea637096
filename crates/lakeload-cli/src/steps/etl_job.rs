//! Glue ETL job definition and runs

use super::deploy::{
    StackOutputs, GENERATED_DATABASE_NAME, GENERATED_RESOURCE_BUCKET_NAME, GENERATED_ROLE_ARN,
};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::poll::{PollOutcome, Poller};
use crate::providers::{EtlService, GlueCommand, JobDefinition, JobRunStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Failed runs are not retried
pub const JOB_MAX_RETRIES: i32 = 0;

pub const JOB_MAX_CONCURRENT_RUNS: i32 = 1;

/// Resource bucket key of the `lakeload-etl` build the launcher downloads
pub const ETL_BINARY_KEY: &str = "bin/lakeload-etl";

/// Job definition for the uploaded script, parametrized from the stack
pub fn job_definition(
    config: &Config,
    outputs: &StackOutputs,
    script_key: &str,
) -> Result<JobDefinition> {
    let resource_bucket = outputs.require(GENERATED_RESOURCE_BUCKET_NAME)?;
    let role_arn = outputs.require(GENERATED_ROLE_ARN)?;
    let database = outputs.require(GENERATED_DATABASE_NAME)?;

    let iam_role = config
        .glue
        .redshift_iam_role
        .as_deref()
        .unwrap_or(role_arn);

    let mut default_arguments = BTreeMap::from([
        ("--SECRET_NAME".to_string(), config.names.secret_name.clone()),
        ("--SECRET_REGION".to_string(), config.aws.region.clone()),
        (
            "--REDSHIFT_TMP_DIR".to_string(),
            format!("s3://{}/temp/", resource_bucket),
        ),
        ("--DATABASE".to_string(), database.to_string()),
        ("--REDSHIFT_IAM_ROLE".to_string(), iam_role.to_string()),
    ]);

    if !config.glue.tables.is_empty() {
        let tables: Vec<&str> = config.glue.tables.iter().map(String::as_str).collect();
        default_arguments.insert("--TABLES".to_string(), tables.join(","));
    }

    if config.glue.command == GlueCommand::PythonShell {
        default_arguments.insert(
            "--ETL_BINARY_LOCATION".to_string(),
            format!("s3://{}/{}", resource_bucket, ETL_BINARY_KEY),
        );
    }

    Ok(JobDefinition {
        name: config.names.job_name.clone(),
        role_arn: role_arn.to_string(),
        command: config.glue.command,
        script_location: format!("s3://{}/{}", resource_bucket, script_key),
        python_version: config.glue.python_version.clone(),
        glue_version: config.glue.glue_version.clone(),
        worker_type: config.glue.worker_type.clone(),
        number_of_workers: config.glue.number_of_workers,
        max_retries: JOB_MAX_RETRIES,
        max_concurrent_runs: JOB_MAX_CONCURRENT_RUNS,
        timeout_minutes: config.glue.timeout_minutes,
        default_arguments,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Created,
    AlreadyExists,
}

/// Create the job unless it exists. Never starts a run.
#[instrument(skip(service, definition), fields(job = %definition.name))]
pub async fn ensure_job(service: &dyn EtlService, definition: &JobDefinition) -> Result<JobOutcome> {
    if definition.name.trim().is_empty() {
        return Err(PipelineError::invalid_input("job name must be non-empty"));
    }

    if service.job_exists(&definition.name).await? {
        info!("Job already exists, skipping creation");
        return Ok(JobOutcome::AlreadyExists);
    }

    service.create_job(definition).await?;
    info!(script = %definition.script_location, "Job created");

    Ok(JobOutcome::Created)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRunSummary {
    pub job_name: String,
    pub run_id: String,
    /// True when an in-flight run was awaited instead of starting one
    pub attached: bool,
}

/// Wait for a successful run of `job_name`, attaching to an active run
/// before starting a new one.
#[instrument(skip(service, poller))]
pub async fn run_job(
    service: &dyn EtlService,
    poller: &Poller,
    job_name: &str,
) -> Result<JobRunSummary> {
    let (run_id, attached) = match service.active_run(job_name).await? {
        Some(run_id) => {
            info!(run_id = %run_id, "Attaching to active job run");
            (run_id, true)
        }
        None => {
            let run_id = service.start_job_run(job_name).await?;
            info!(run_id = %run_id, "Job run started");
            (run_id, false)
        }
    };

    let operation = format!("job run '{}' of '{}'", run_id, job_name);
    let run_ref = run_id.as_str();
    poller
        .until(&operation, || async move {
            match service.job_run_status(job_name, run_ref).await? {
                JobRunStatus::Succeeded => Ok(PollOutcome::Done(())),
                JobRunStatus::Running(state) => Ok(PollOutcome::Pending(state)),
                JobRunStatus::Failed(reason) => Err(PipelineError::JobRunFailed {
                    job: job_name.to_string(),
                    run_id: run_ref.to_string(),
                    reason,
                }),
            }
        })
        .await?;

    info!(run_id = %run_id, "Job run succeeded");

    Ok(JobRunSummary {
        job_name: job_name.to_string(),
        run_id,
        attached,
    })
}
