use super::{
    CrawlerService, CrawlerSnapshot, CrawlerStatus, EtlService, GlueCommand, JobDefinition,
    JobRunStatus,
};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_glue::{
    error::DisplayErrorContext,
    types::{ExecutionProperty, JobCommand, WorkerType},
    Client,
};
use tracing::{info, instrument};

const SERVICE: &str = "Glue";

/// DPUs of a Python shell job; the full unit leaves the binary 16 GB
const PYTHON_SHELL_MAX_CAPACITY: f64 = 1.0;

/// How many recent runs to scan for one still in flight
const ACTIVE_RUN_LOOKBACK: i32 = 25;

fn provider_error<E>(err: E) -> PipelineError
where
    E: std::error::Error,
{
    PipelineError::provider(SERVICE, DisplayErrorContext(&err).to_string())
}

// ============================================================================
// Crawler
// ============================================================================

pub struct GlueCrawler {
    client: Client,
}

impl GlueCrawler {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl CrawlerService for GlueCrawler {
    #[instrument(skip(self))]
    async fn start_crawler(&self, name: &str) -> Result<()> {
        match self.client.start_crawler().name(name).send().await {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_crawler_running_exception()) =>
            {
                info!(crawler = name, "Crawler is already running, waiting for it");
                Ok(())
            }
            Err(e) => Err(provider_error(e)),
        }
    }

    #[instrument(skip(self))]
    async fn crawler_snapshot(&self, name: &str) -> Result<CrawlerSnapshot> {
        let output = self
            .client
            .get_crawler()
            .name(name)
            .send()
            .await
            .map_err(provider_error)?;

        let crawler = output.crawler().ok_or_else(|| {
            PipelineError::provider(SERVICE, format!("crawler '{}' not found", name))
        })?;

        let last_crawl = crawler.last_crawl();
        let status = classify_crawler(
            crawler.state().map(|s| s.as_str()),
            last_crawl.and_then(|l| l.status()).map(|s| s.as_str()),
            last_crawl.and_then(|l| l.error_message()),
        );

        let target_path = crawler
            .targets()
            .and_then(|t| t.s3_targets().first())
            .and_then(|t| t.path())
            .map(str::to_string);

        Ok(CrawlerSnapshot {
            status,
            target_path,
        })
    }
}

/// Glue crawlers only report READY, RUNNING or STOPPING; the outcome of the
/// crawl lives in `LastCrawl.Status` (SUCCEEDED, CANCELLED, FAILED).
pub(crate) fn classify_crawler(
    state: Option<&str>,
    last_crawl_status: Option<&str>,
    last_crawl_error: Option<&str>,
) -> CrawlerStatus {
    match (state, last_crawl_status) {
        (Some("READY"), Some(outcome @ ("FAILED" | "CANCELLED"))) => CrawlerStatus::Failed(
            last_crawl_error
                .map(str::to_string)
                .unwrap_or_else(|| format!("last crawl {}", outcome)),
        ),
        (Some("READY"), _) => CrawlerStatus::Ready,
        (Some("FAILED"), _) => CrawlerStatus::Failed(
            last_crawl_error.unwrap_or("crawler reported FAILED").to_string(),
        ),
        (Some(other), _) => CrawlerStatus::Running(other.to_string()),
        (None, _) => CrawlerStatus::Running("UNKNOWN".to_string()),
    }
}

// ============================================================================
// ETL job
// ============================================================================

pub struct GlueEtl {
    client: Client,
}

impl GlueEtl {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl EtlService for GlueEtl {
    #[instrument(skip(self))]
    async fn job_exists(&self, name: &str) -> Result<bool> {
        match self.client.get_job().job_name(name).send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_entity_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(provider_error(e)),
        }
    }

    #[instrument(skip(self, definition), fields(job = %definition.name))]
    async fn create_job(&self, definition: &JobDefinition) -> Result<()> {
        let command = JobCommand::builder()
            .name(definition.command.as_str())
            .script_location(&definition.script_location)
            .python_version(&definition.python_version)
            .build();

        let execution = ExecutionProperty::builder()
            .max_concurrent_runs(definition.max_concurrent_runs)
            .build();

        let mut request = self
            .client
            .create_job()
            .name(&definition.name)
            .role(&definition.role_arn)
            .command(command)
            .glue_version(&definition.glue_version)
            .max_retries(definition.max_retries)
            .timeout(definition.timeout_minutes)
            .execution_property(execution);

        request = match job_capacity(definition) {
            JobCapacity::MaxCapacity(dpu) => request.max_capacity(dpu),
            JobCapacity::Workers { worker_type, count } => request
                .worker_type(WorkerType::from(worker_type))
                .number_of_workers(count),
        };

        for (key, value) in &definition.default_arguments {
            request = request.default_arguments(key, value);
        }

        request.send().await.map_err(provider_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn active_run(&self, name: &str) -> Result<Option<String>> {
        let output = self
            .client
            .get_job_runs()
            .job_name(name)
            .max_results(ACTIVE_RUN_LOOKBACK)
            .send()
            .await
            .map_err(provider_error)?;

        Ok(output
            .job_runs()
            .iter()
            .find(|run| {
                run.job_run_state().is_some_and(|s| {
                    matches!(classify_job_run(Some(s.as_str()), None), JobRunStatus::Running(_))
                })
            })
            .and_then(|run| run.id())
            .map(str::to_string))
    }

    #[instrument(skip(self))]
    async fn start_job_run(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .start_job_run()
            .job_name(name)
            .send()
            .await
            .map_err(provider_error)?;

        output
            .job_run_id()
            .map(str::to_string)
            .ok_or_else(|| PipelineError::provider(SERVICE, "StartJobRun returned no run id"))
    }

    #[instrument(skip(self))]
    async fn job_run_status(&self, name: &str, run_id: &str) -> Result<JobRunStatus> {
        let output = self
            .client
            .get_job_run()
            .job_name(name)
            .run_id(run_id)
            .send()
            .await
            .map_err(provider_error)?;

        let run = output.job_run().ok_or_else(|| {
            PipelineError::provider(SERVICE, format!("job run '{}' not found", run_id))
        })?;

        Ok(classify_job_run(
            run.job_run_state().map(|s| s.as_str()),
            run.error_message(),
        ))
    }
}

/// How the job is sized; Glue rejects worker settings on Python shell jobs
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobCapacity<'a> {
    MaxCapacity(f64),
    Workers { worker_type: &'a str, count: i32 },
}

pub(crate) fn job_capacity(definition: &JobDefinition) -> JobCapacity<'_> {
    match definition.command {
        GlueCommand::PythonShell => JobCapacity::MaxCapacity(PYTHON_SHELL_MAX_CAPACITY),
        GlueCommand::GlueEtl => JobCapacity::Workers {
            worker_type: &definition.worker_type,
            count: definition.number_of_workers,
        },
    }
}

pub(crate) fn classify_job_run(state: Option<&str>, error_message: Option<&str>) -> JobRunStatus {
    match state {
        Some("SUCCEEDED") => JobRunStatus::Succeeded,
        Some(s @ ("FAILED" | "ERROR" | "TIMEOUT" | "STOPPED" | "EXPIRED")) => {
            JobRunStatus::Failed(match error_message {
                Some(msg) => format!("{}: {}", s, msg),
                None => s.to_string(),
            })
        }
        Some(s) => JobRunStatus::Running(s.to_string()),
        None => JobRunStatus::Running("UNKNOWN".to_string()),
    }
}
