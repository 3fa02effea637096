//! Control-plane seams
//!
//! Every pipeline step receives the collaborators it talks to through one of
//! these traits. The AWS-backed implementations live in the submodules;
//! tests inject in-memory doubles.

use crate::error::Result;
use async_trait::async_trait;
use aws_config::SdkConfig;
use lakeload_common::WarehouseSecret;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub mod cloudformation;
pub mod glue;
pub mod redshift;
pub mod s3;
pub mod secrets;

pub use cloudformation::CloudFormationProvisioner;
pub use glue::{GlueCrawler, GlueEtl};
pub use redshift::RedshiftWarehouse;
pub use s3::S3ObjectStore;
pub use secrets::SecretsManagerStore;

// ============================================================================
// Stacks
// ============================================================================

/// Stack status reduced to what stack creation cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    InProgress(String),
    Complete,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub name: String,
    pub status: StackStatus,
    /// Declared outputs as (key, value) pairs
    pub outputs: Vec<(String, String)>,
}

#[async_trait]
pub trait StackProvisioner: Send + Sync {
    async fn validate_template(&self, template_body: &str) -> Result<()>;

    /// `None` when no stack with that name exists
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>>;

    /// Submit stack creation; returns the stack id
    async fn create_stack(&self, stack_name: &str, template_body: &str) -> Result<String>;
}

// ============================================================================
// Objects
// ============================================================================

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;
}

// ============================================================================
// Secrets
// ============================================================================

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret_exists(&self, name: &str) -> Result<bool>;

    async fn create_secret(&self, name: &str, secret_string: &str) -> Result<()>;
}

// ============================================================================
// Crawlers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlerStatus {
    Running(String),
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerSnapshot {
    pub status: CrawlerStatus,
    /// First S3 target of the crawler
    pub target_path: Option<String>,
}

#[async_trait]
pub trait CrawlerService: Send + Sync {
    async fn start_crawler(&self, name: &str) -> Result<()>;

    async fn crawler_snapshot(&self, name: &str) -> Result<CrawlerSnapshot>;
}

// ============================================================================
// ETL jobs
// ============================================================================

/// Kind of job Glue creates, which decides how the script is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlueCommand {
    /// Single-node Python runtime running the `lakeload-etl` launcher
    PythonShell,
    /// Spark runtime
    GlueEtl,
}

impl GlueCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlueCommand::PythonShell => "pythonshell",
            GlueCommand::GlueEtl => "glueetl",
        }
    }

    /// Newest Glue version offering this command
    pub fn default_glue_version(&self) -> &'static str {
        match self {
            GlueCommand::PythonShell => "3.0",
            GlueCommand::GlueEtl => "4.0",
        }
    }

    pub fn default_python_version(&self) -> &'static str {
        match self {
            GlueCommand::PythonShell => "3.9",
            GlueCommand::GlueEtl => "3",
        }
    }
}

impl std::fmt::Display for GlueCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GlueCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pythonshell" => Ok(GlueCommand::PythonShell),
            "glueetl" => Ok(GlueCommand::GlueEtl),
            other => Err(format!(
                "unknown Glue command '{}', expected 'pythonshell' or 'glueetl'",
                other
            )),
        }
    }
}

/// Everything needed to create the managed ETL job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    pub name: String,
    pub role_arn: String,
    pub command: GlueCommand,
    /// `s3://bucket/key` of the job script
    pub script_location: String,
    pub python_version: String,
    pub glue_version: String,
    /// Spark workers; ignored by [`GlueCommand::PythonShell`] jobs
    pub worker_type: String,
    pub number_of_workers: i32,
    pub max_retries: i32,
    pub max_concurrent_runs: i32,
    pub timeout_minutes: i32,
    /// Passed to every run, keys include the leading `--`
    pub default_arguments: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRunStatus {
    Running(String),
    Succeeded,
    Failed(String),
}

#[async_trait]
pub trait EtlService: Send + Sync {
    async fn job_exists(&self, name: &str) -> Result<bool>;

    async fn create_job(&self, definition: &JobDefinition) -> Result<()>;

    /// Id of a run of `name` that has not reached a terminal state yet
    async fn active_run(&self, name: &str) -> Result<Option<String>>;

    /// Start a run; returns its id
    async fn start_job_run(&self, name: &str) -> Result<String>;

    async fn job_run_status(&self, name: &str, run_id: &str) -> Result<JobRunStatus>;
}

// ============================================================================
// Warehouse
// ============================================================================

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn count_rows(&self, table: &str) -> Result<u64>;
}

/// One implementation per seam
#[derive(Clone)]
pub struct Services {
    pub stacks: Arc<dyn StackProvisioner>,
    pub objects: Arc<dyn ObjectStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub crawlers: Arc<dyn CrawlerService>,
    pub etl: Arc<dyn EtlService>,
    pub warehouse: Arc<dyn Warehouse>,
}

impl Services {
    /// AWS control-plane clients plus a direct warehouse connection
    pub fn aws(sdk_config: &SdkConfig, warehouse: &WarehouseSecret) -> Result<Self> {
        Ok(Self {
            stacks: Arc::new(CloudFormationProvisioner::new(sdk_config)),
            objects: Arc::new(S3ObjectStore::new(sdk_config)),
            secrets: Arc::new(SecretsManagerStore::new(sdk_config)),
            crawlers: Arc::new(GlueCrawler::new(sdk_config)),
            etl: Arc::new(GlueEtl::new(sdk_config)),
            warehouse: Arc::new(RedshiftWarehouse::new(warehouse)?),
        })
    }
}
