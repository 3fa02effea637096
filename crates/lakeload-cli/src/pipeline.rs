//! Stage orchestration
//!
//! A [`Pipeline`] couples the loaded configuration with the provider
//! implementations. Each stage can be run alone; [`Pipeline::run_all`] runs
//! them strictly in order and stops at the first fatal error.

use crate::config::Config;
use crate::error::Result;
use crate::providers::Services;
use crate::steps::crawler::run_crawler;
use crate::steps::deploy::{
    deploy_stack, fetch_outputs, read_template, DeployOutcome, StackOutputs,
    GENERATED_BUCKET_NAME, GENERATED_CRAWLER, GENERATED_RESOURCE_BUCKET_NAME,
};
use crate::steps::etl_job::{self, job_definition, JobOutcome, JobRunSummary, ETL_BINARY_KEY};
use crate::steps::reconcile::{self, ReconcileReport};
use crate::steps::secret::{self, SecretOutcome};
use crate::steps::upload::{
    discover_csv_files, object_key, upload_all, upload_file, upload_file_as, UploadReport,
    UploadedObject,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Stack outputs plus whether this run created the stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub created: bool,
    pub outputs: StackOutputs,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub deployment: Deployment,
    pub upload: UploadReport,
    /// `None` when a best-effort script upload failed
    pub script: Option<UploadedObject>,
    /// `None` when no build is configured or a best-effort upload failed
    pub etl_binary: Option<UploadedObject>,
    /// `None` when a best-effort secret publication failed
    pub secret: Option<SecretOutcome>,
    pub crawled_path: String,
    pub job: JobOutcome,
    pub job_run: JobRunSummary,
    pub reconciliation: ReconcileReport,
}

impl RunSummary {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

pub struct Pipeline {
    config: Config,
    services: Services,
}

impl Pipeline {
    pub fn new(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate and deploy the template; reads the outputs of an existing
    /// stack instead of creating it again.
    pub async fn deploy(&self) -> Result<Deployment> {
        let template = read_template(&self.config.paths.template_path)?;
        let stack_name = &self.config.names.stack_name;

        match deploy_stack(
            self.services.stacks.as_ref(),
            &self.config.poll.stack_poller(),
            stack_name,
            &template,
        )
        .await?
        {
            DeployOutcome::Created(outputs) => Ok(Deployment {
                created: true,
                outputs,
            }),
            DeployOutcome::AlreadyExists => Ok(Deployment {
                created: false,
                outputs: self.outputs().await?,
            }),
        }
    }

    /// Outputs of the already-deployed stack
    pub async fn outputs(&self) -> Result<StackOutputs> {
        fetch_outputs(self.services.stacks.as_ref(), &self.config.names.stack_name).await
    }

    pub async fn upload_data(&self, outputs: &StackOutputs) -> Result<UploadReport> {
        let bucket = outputs.require(GENERATED_BUCKET_NAME)?;
        let files = discover_csv_files(&self.config.paths.data_dir)?;
        info!(files = files.len(), bucket, "Uploading data files");

        upload_all(
            self.services.objects.as_ref(),
            self.config.policy.upload,
            bucket,
            &files,
        )
        .await
    }

    pub async fn upload_script(&self, outputs: &StackOutputs) -> Result<Option<UploadedObject>> {
        let bucket = outputs.require(GENERATED_RESOURCE_BUCKET_NAME)?;
        let result = upload_file(
            self.services.objects.as_ref(),
            bucket,
            &self.config.paths.script_path,
        )
        .await;

        self.config.policy.upload.apply("ETL script upload", result)
    }

    /// Upload the configured `lakeload-etl` build where the launcher expects
    /// it. Without `ETL_BINARY_PATH` the build already in the bucket is used.
    pub async fn upload_etl_binary(
        &self,
        outputs: &StackOutputs,
    ) -> Result<Option<UploadedObject>> {
        let Some(path) = &self.config.paths.etl_binary_path else {
            info!("No ETL binary configured, keeping the uploaded one");
            return Ok(None);
        };

        let bucket = outputs.require(GENERATED_RESOURCE_BUCKET_NAME)?;
        let result =
            upload_file_as(self.services.objects.as_ref(), bucket, ETL_BINARY_KEY, path).await;

        self.config.policy.upload.apply("ETL binary upload", result)
    }

    pub async fn publish_secret(&self) -> Result<Option<SecretOutcome>> {
        let result = secret::publish_secret(
            self.services.secrets.as_ref(),
            &self.config.names.secret_name,
            &self.config.warehouse,
        )
        .await;

        self.config.policy.secret.apply("secret publication", result)
    }

    pub async fn crawl(&self, outputs: &StackOutputs) -> Result<String> {
        let crawler = outputs.require(GENERATED_CRAWLER)?;
        run_crawler(
            self.services.crawlers.as_ref(),
            &self.config.poll.crawler_poller(),
            crawler,
        )
        .await
    }

    pub async fn ensure_job(&self, outputs: &StackOutputs) -> Result<JobOutcome> {
        let script_key = object_key(&self.config.paths.script_path)?;
        let definition = job_definition(&self.config, outputs, &script_key)?;
        etl_job::ensure_job(self.services.etl.as_ref(), &definition).await
    }

    pub async fn run_job(&self) -> Result<JobRunSummary> {
        etl_job::run_job(
            self.services.etl.as_ref(),
            &self.config.poll.job_poller(),
            &self.config.names.job_name,
        )
        .await
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let files = discover_csv_files(&self.config.paths.data_dir)?;
        reconcile::reconcile(
            self.services.warehouse.as_ref(),
            &files,
            &self.config.reconcile.exempt_tables,
        )
        .await
    }

    /// Every stage in order
    pub async fn run_all(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        info!(stack = %self.config.names.stack_name, "Pipeline run started");

        let deployment = self.deploy().await?;
        let upload = self.upload_data(&deployment.outputs).await?;
        let script = self.upload_script(&deployment.outputs).await?;
        let etl_binary = self.upload_etl_binary(&deployment.outputs).await?;
        let secret = self.publish_secret().await?;
        let crawled_path = self.crawl(&deployment.outputs).await?;
        let job = self.ensure_job(&deployment.outputs).await?;
        let job_run = self.run_job().await?;
        let reconciliation = self.reconcile().await?;

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            deployment,
            upload,
            script,
            etl_binary,
            secret,
            crawled_path,
            job,
            job_run,
            reconciliation,
        };

        info!(
            elapsed_secs = summary.elapsed().num_seconds(),
            "Pipeline run finished"
        );

        Ok(summary)
    }
}
