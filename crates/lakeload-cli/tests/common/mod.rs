//! In-memory doubles for every provider seam plus workspace fixtures

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use lakeload_cli::error::{PipelineError, Result};
use lakeload_cli::providers::{
    CrawlerService, CrawlerSnapshot, CrawlerStatus, EtlService, JobDefinition, JobRunStatus,
    ObjectStore, SecretStore, Services, StackDescription, StackProvisioner, StackStatus,
    Warehouse,
};
use lakeload_cli::Config;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const DATA_BUCKET: &str = "lakeload-data-bucket";
pub const RESOURCE_BUCKET: &str = "lakeload-resource-bucket";
pub const CRAWLER: &str = "lakeload-crawler";
pub const DATABASE: &str = "lakeload_db";
pub const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/lakeload-glue";
/// Object key of the launcher shipped with `lakeload-etl`
pub const LAUNCHER_KEY: &str = "run_lakeload_etl.py";

#[derive(Default)]
pub struct CloudState {
    pub calls: Vec<String>,

    pub stack_exists: bool,
    /// Statuses reported after creation; the last one repeats
    pub stack_statuses: VecDeque<StackStatus>,
    pub outputs: Vec<(String, String)>,

    pub objects: Vec<(String, String)>,
    /// File names whose upload fails
    pub failing_uploads: BTreeSet<String>,

    pub secrets: BTreeMap<String, String>,
    /// Secret creation is rejected
    pub failing_secret: bool,

    pub crawler_statuses: VecDeque<CrawlerStatus>,
    pub crawler_path: Option<String>,

    pub jobs: BTreeMap<String, JobDefinition>,
    pub active_run: Option<String>,
    pub run_statuses: VecDeque<JobRunStatus>,
    pub runs_started: u32,

    pub warehouse_rows: BTreeMap<String, u64>,
}

/// Pop the next scripted status, repeating the last one
fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[derive(Default)]
pub struct FakeCloud {
    pub state: Mutex<CloudState>,
}

impl FakeCloud {
    /// A cloud where every stage succeeds on its second status check
    pub fn healthy() -> Arc<Self> {
        let cloud = FakeCloud::default();
        {
            let mut state = cloud.state.lock().unwrap();
            state.stack_statuses = VecDeque::from([
                StackStatus::InProgress("CREATE_IN_PROGRESS".to_string()),
                StackStatus::Complete,
            ]);
            state.outputs = default_outputs();
            state.crawler_statuses = VecDeque::from([
                CrawlerStatus::Running("RUNNING".to_string()),
                CrawlerStatus::Ready,
            ]);
            state.crawler_path = Some(format!("s3://{}/", DATA_BUCKET));
            state.run_statuses = VecDeque::from([
                JobRunStatus::Running("RUNNING".to_string()),
                JobRunStatus::Succeeded,
            ]);
            state.warehouse_rows = BTreeMap::from([
                ("category".to_string(), 3),
                ("sales".to_string(), 2),
            ]);
        }
        Arc::new(cloud)
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            stacks: self.clone(),
            objects: self.clone(),
            secrets: self.clone(),
            crawlers: self.clone(),
            etl: self.clone(),
            warehouse: self.clone(),
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut CloudState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }
}

pub fn default_outputs() -> Vec<(String, String)> {
    vec![
        ("GeneratedBucketName".to_string(), DATA_BUCKET.to_string()),
        ("GeneratedResourceBucketName".to_string(), RESOURCE_BUCKET.to_string()),
        ("GeneratedCrawler".to_string(), CRAWLER.to_string()),
        ("GeneratedDatabaseName".to_string(), DATABASE.to_string()),
        ("GeneratedRoleArn".to_string(), ROLE_ARN.to_string()),
    ]
}

#[async_trait]
impl StackProvisioner for FakeCloud {
    async fn validate_template(&self, template_body: &str) -> Result<()> {
        self.record("validate_template");
        if template_body.contains("INVALID") {
            return Err(PipelineError::TemplateValidation(
                "Template format error".to_string(),
            ));
        }
        Ok(())
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        self.record("describe_stack");
        let mut state = self.state.lock().unwrap();
        if !state.stack_exists {
            return Ok(None);
        }
        let status = next(&mut state.stack_statuses).unwrap_or(StackStatus::Complete);
        Ok(Some(StackDescription {
            name: stack_name.to_string(),
            status,
            outputs: state.outputs.clone(),
        }))
    }

    async fn create_stack(&self, stack_name: &str, _template_body: &str) -> Result<String> {
        self.record("create_stack");
        self.state.lock().unwrap().stack_exists = true;
        Ok(format!("arn:aws:cloudformation:stack/{}", stack_name))
    }
}

#[async_trait]
impl ObjectStore for FakeCloud {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        self.record("put_file");
        let mut state = self.state.lock().unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap();
        if state.failing_uploads.contains(file_name) {
            return Err(PipelineError::provider("S3", "AccessDenied"));
        }
        state.objects.push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FakeCloud {
    async fn secret_exists(&self, name: &str) -> Result<bool> {
        self.record("secret_exists");
        Ok(self.state.lock().unwrap().secrets.contains_key(name))
    }

    async fn create_secret(&self, name: &str, secret_string: &str) -> Result<()> {
        self.record("create_secret");
        let mut state = self.state.lock().unwrap();
        if state.failing_secret {
            return Err(PipelineError::provider("SecretsManager", "AccessDeniedException"));
        }
        state
            .secrets
            .insert(name.to_string(), secret_string.to_string());
        Ok(())
    }
}

#[async_trait]
impl CrawlerService for FakeCloud {
    async fn start_crawler(&self, _name: &str) -> Result<()> {
        self.record("start_crawler");
        Ok(())
    }

    async fn crawler_snapshot(&self, _name: &str) -> Result<CrawlerSnapshot> {
        self.record("crawler_snapshot");
        let mut state = self.state.lock().unwrap();
        let status = next(&mut state.crawler_statuses).unwrap_or(CrawlerStatus::Ready);
        Ok(CrawlerSnapshot {
            status,
            target_path: state.crawler_path.clone(),
        })
    }
}

#[async_trait]
impl EtlService for FakeCloud {
    async fn job_exists(&self, name: &str) -> Result<bool> {
        self.record("job_exists");
        Ok(self.state.lock().unwrap().jobs.contains_key(name))
    }

    async fn create_job(&self, definition: &JobDefinition) -> Result<()> {
        self.record("create_job");
        self.state
            .lock()
            .unwrap()
            .jobs
            .insert(definition.name.clone(), definition.clone());
        Ok(())
    }

    async fn active_run(&self, _name: &str) -> Result<Option<String>> {
        self.record("active_run");
        Ok(self.state.lock().unwrap().active_run.clone())
    }

    async fn start_job_run(&self, _name: &str) -> Result<String> {
        self.record("start_job_run");
        let mut state = self.state.lock().unwrap();
        state.runs_started += 1;
        Ok(format!("jr_{:04}", state.runs_started))
    }

    async fn job_run_status(&self, _name: &str, _run_id: &str) -> Result<JobRunStatus> {
        self.record("job_run_status");
        let mut state = self.state.lock().unwrap();
        Ok(next(&mut state.run_statuses).unwrap_or(JobRunStatus::Succeeded))
    }
}

#[async_trait]
impl Warehouse for FakeCloud {
    async fn count_rows(&self, table: &str) -> Result<u64> {
        self.record("count_rows");
        self.state
            .lock()
            .unwrap()
            .warehouse_rows
            .get(table)
            .copied()
            .ok_or_else(|| PipelineError::provider("Redshift", format!("relation \"{}\" does not exist", table)))
    }
}

/// Data dir with `category.csv` (3 rows) and `sales.csv` (2 rows), a
/// template and an ETL build. The script is the shipped launcher.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("category.csv"), "id,name\n1,a\n2,b\n3,c\n").unwrap();
        std::fs::write(data.join("sales.csv"), "id,amount\n1,10.5\n2,3.25\n").unwrap();
        std::fs::write(
            dir.path().join("template.yaml"),
            "AWSTemplateFormatVersion: '2010-09-09'\nResources: {}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("lakeload-etl"), b"\x7fELF").unwrap();
        Self { dir }
    }

    pub fn env(&self) -> HashMap<String, String> {
        let root = self.dir.path();
        [
            ("AWS_ACCESS_KEY_ID", "AKIATEST".to_string()),
            ("AWS_SECRET_ACCESS_KEY", "secret".to_string()),
            ("AWS_DEFAULT_REGION", "eu-west-1".to_string()),
            ("DATA_PATH", root.join("data").display().to_string()),
            (
                "CLOUDFORMATION_TEMPLATE_PATH",
                root.join("template.yaml").display().to_string(),
            ),
            ("ETL_SCRIPT_PATH", launcher_path().display().to_string()),
            ("ETL_BINARY_PATH", root.join("lakeload-etl").display().to_string()),
            ("STACK_NAME", "lakeload".to_string()),
            ("GLUE_JOB_NAME", "lakeload-etl".to_string()),
            ("SECRET_NAME", "lakeload/redshift".to_string()),
            ("REDSHIFT_USERNAME", "admin".to_string()),
            ("REDSHIFT_PASSWORD", "hunter2".to_string()),
            ("REDSHIFT_DBNAME", "dev".to_string()),
            ("REDSHIFT_HOST", "cluster.example.com".to_string()),
            ("REDSHIFT_PORT", "5439".to_string()),
            ("REDSHIFT_ENGINE", "redshift".to_string()),
            ("POLL_INTERVAL_SECS", "1".to_string()),
            ("STACK_MAX_WAIT_SECS", "30".to_string()),
            ("CRAWLER_MAX_WAIT_SECS", "30".to_string()),
            ("JOB_MAX_WAIT_SECS", "30".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn config(&self) -> Config {
        self.config_with(&[])
    }

    pub fn config_with(&self, overrides: &[(&str, &str)]) -> Config {
        let mut env = self.env();
        for (k, v) in overrides {
            env.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|name| env.get(name).cloned()).unwrap()
    }
}

pub fn launcher_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../lakeload-etl/launcher")
        .join(LAUNCHER_KEY)
}
