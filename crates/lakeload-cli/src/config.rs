//! Configuration management
//!
//! Everything a run needs comes from the process environment (optionally
//! seeded from a `.env` file). Required values fail fast; optional ones fall
//! back to the `DEFAULT_*` constants below.

use crate::error::{PipelineError, Result};
use crate::poll::Poller;
use crate::policy::StepPolicy;
use crate::providers::GlueCommand;
use lakeload_common::{AwsSettings, WarehouseSecret};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Seconds between two status checks of a remote operation.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Upper bound on waiting for stack creation (30 minutes).
pub const DEFAULT_STACK_MAX_WAIT_SECS: u64 = 1800;

/// Upper bound on waiting for a crawler (1 hour).
pub const DEFAULT_CRAWLER_MAX_WAIT_SECS: u64 = 3600;

/// Upper bound on waiting for an ETL job run (2 hours).
pub const DEFAULT_JOB_MAX_WAIT_SECS: u64 = 7200;

/// Glue job kind; the launcher script needs a Python shell job.
pub const DEFAULT_GLUE_JOB_COMMAND: GlueCommand = GlueCommand::PythonShell;

/// Glue worker type of the job definition.
pub const DEFAULT_GLUE_WORKER_TYPE: &str = "G.1X";

/// Glue worker count of the job definition.
pub const DEFAULT_GLUE_NUMBER_OF_WORKERS: i32 = 2;

/// Job run timeout enforced by Glue itself, in minutes.
pub const DEFAULT_GLUE_JOB_TIMEOUT_MINUTES: i32 = 60;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub aws: AwsSettings,
    pub paths: PathsConfig,
    pub names: NamesConfig,
    /// Used both as the secret payload and for the reconciliation connection
    pub warehouse: WarehouseSecret,
    pub poll: PollConfig,
    pub policy: PolicyConfig,
    pub reconcile: ReconcileConfig,
    pub glue: GlueJobConfig,
}

/// Local inputs
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub template_path: PathBuf,
    pub script_path: PathBuf,
    /// `lakeload-etl` build uploaded next to the script, when set
    pub etl_binary_path: Option<PathBuf>,
}

/// Names of the remote resources this tool owns
#[derive(Debug, Clone)]
pub struct NamesConfig {
    pub stack_name: String,
    pub job_name: String,
    pub secret_name: String,
}

/// Polling cadence and bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub stack_max_wait_secs: u64,
    pub crawler_max_wait_secs: u64,
    pub job_max_wait_secs: u64,
}

impl PollConfig {
    pub fn stack_poller(&self) -> Poller {
        self.poller(self.stack_max_wait_secs)
    }

    pub fn crawler_poller(&self) -> Poller {
        self.poller(self.crawler_max_wait_secs)
    }

    pub fn job_poller(&self) -> Poller {
        self.poller(self.job_max_wait_secs)
    }

    fn poller(&self, max_wait_secs: u64) -> Poller {
        Poller::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(max_wait_secs),
        )
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            stack_max_wait_secs: DEFAULT_STACK_MAX_WAIT_SECS,
            crawler_max_wait_secs: DEFAULT_CRAWLER_MAX_WAIT_SECS,
            job_max_wait_secs: DEFAULT_JOB_MAX_WAIT_SECS,
        }
    }
}

/// Failure policy of the steps that may be best-effort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub upload: StepPolicy,
    pub secret: StepPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            upload: StepPolicy::BestEffort,
            secret: StepPolicy::BestEffort,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Tables whose row-count mismatches are tolerated
    pub exempt_tables: BTreeSet<String>,
}

/// Fixed parameters of the Glue job definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlueJobConfig {
    pub command: GlueCommand,
    pub glue_version: String,
    pub python_version: String,
    pub worker_type: String,
    pub number_of_workers: i32,
    pub timeout_minutes: i32,
    /// Role the warehouse assumes for COPY; the stack's role when unset
    pub redshift_iam_role: Option<String>,
    /// Tables the job reloads; all of them when empty
    pub tables: BTreeSet<String>,
}

impl Default for GlueJobConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_GLUE_JOB_COMMAND,
            glue_version: DEFAULT_GLUE_JOB_COMMAND.default_glue_version().to_string(),
            python_version: DEFAULT_GLUE_JOB_COMMAND.default_python_version().to_string(),
            worker_type: DEFAULT_GLUE_WORKER_TYPE.to_string(),
            number_of_workers: DEFAULT_GLUE_NUMBER_OF_WORKERS,
            timeout_minutes: DEFAULT_GLUE_JOB_TIMEOUT_MINUTES,
            redshift_iam_role: None,
            tables: BTreeSet::new(),
        }
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let command: GlueCommand = env.parsed("GLUE_JOB_COMMAND", DEFAULT_GLUE_JOB_COMMAND)?;

        let config = Config {
            aws: AwsSettings {
                access_key_id: env.required("AWS_ACCESS_KEY_ID")?,
                secret_access_key: env.required("AWS_SECRET_ACCESS_KEY")?,
                region: env.required("AWS_DEFAULT_REGION")?,
                endpoint_url: env.optional("AWS_ENDPOINT_URL"),
            },
            paths: PathsConfig {
                data_dir: PathBuf::from(env.required("DATA_PATH")?),
                template_path: PathBuf::from(env.required("CLOUDFORMATION_TEMPLATE_PATH")?),
                script_path: PathBuf::from(env.required("ETL_SCRIPT_PATH")?),
                etl_binary_path: env.optional("ETL_BINARY_PATH").map(PathBuf::from),
            },
            names: NamesConfig {
                stack_name: env.required("STACK_NAME")?,
                job_name: env.required("GLUE_JOB_NAME")?,
                secret_name: env.required("SECRET_NAME")?,
            },
            warehouse: WarehouseSecret {
                username: env.required("REDSHIFT_USERNAME")?,
                password: env.required("REDSHIFT_PASSWORD")?,
                dbname: env.required("REDSHIFT_DBNAME")?,
                host: env.required("REDSHIFT_HOST")?,
                port: env.required("REDSHIFT_PORT")?,
                engine: env.required("REDSHIFT_ENGINE")?,
            },
            poll: PollConfig {
                interval_secs: env.parsed("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
                stack_max_wait_secs: env
                    .parsed("STACK_MAX_WAIT_SECS", DEFAULT_STACK_MAX_WAIT_SECS)?,
                crawler_max_wait_secs: env
                    .parsed("CRAWLER_MAX_WAIT_SECS", DEFAULT_CRAWLER_MAX_WAIT_SECS)?,
                job_max_wait_secs: env.parsed("JOB_MAX_WAIT_SECS", DEFAULT_JOB_MAX_WAIT_SECS)?,
            },
            policy: PolicyConfig {
                upload: env.parsed("UPLOAD_POLICY", StepPolicy::BestEffort)?,
                secret: env.parsed("SECRET_POLICY", StepPolicy::BestEffort)?,
            },
            reconcile: ReconcileConfig {
                exempt_tables: env
                    .optional("RECONCILE_EXEMPT_TABLES")
                    .map(|raw| parse_table_list(&raw))
                    .unwrap_or_default(),
            },
            glue: GlueJobConfig {
                command,
                glue_version: env
                    .optional("GLUE_VERSION")
                    .unwrap_or_else(|| command.default_glue_version().to_string()),
                python_version: env
                    .optional("GLUE_PYTHON_VERSION")
                    .unwrap_or_else(|| command.default_python_version().to_string()),
                worker_type: env
                    .optional("GLUE_WORKER_TYPE")
                    .unwrap_or_else(|| DEFAULT_GLUE_WORKER_TYPE.to_string()),
                number_of_workers: env
                    .parsed("GLUE_NUMBER_OF_WORKERS", DEFAULT_GLUE_NUMBER_OF_WORKERS)?,
                timeout_minutes: env
                    .parsed("GLUE_JOB_TIMEOUT_MINUTES", DEFAULT_GLUE_JOB_TIMEOUT_MINUTES)?,
                redshift_iam_role: env.optional("REDSHIFT_IAM_ROLE"),
                tables: env
                    .optional("ETL_TABLES")
                    .map(|raw| parse_table_list(&raw))
                    .unwrap_or_default(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(PipelineError::invalid_env(
                "POLL_INTERVAL_SECS",
                "must be greater than 0",
            ));
        }

        for (name, max_wait) in [
            ("STACK_MAX_WAIT_SECS", self.poll.stack_max_wait_secs),
            ("CRAWLER_MAX_WAIT_SECS", self.poll.crawler_max_wait_secs),
            ("JOB_MAX_WAIT_SECS", self.poll.job_max_wait_secs),
        ] {
            if max_wait < self.poll.interval_secs {
                return Err(PipelineError::invalid_env(
                    name,
                    format!(
                        "{} is shorter than the poll interval ({}s)",
                        max_wait, self.poll.interval_secs
                    ),
                ));
            }
        }

        if self.warehouse.port_number().is_err() {
            return Err(PipelineError::invalid_env(
                "REDSHIFT_PORT",
                format!("'{}' is not a valid port", self.warehouse.port),
            ));
        }

        if self.glue.number_of_workers <= 0 {
            return Err(PipelineError::invalid_env(
                "GLUE_NUMBER_OF_WORKERS",
                "must be greater than 0",
            ));
        }

        if self.glue.timeout_minutes <= 0 {
            return Err(PipelineError::invalid_env(
                "GLUE_JOB_TIMEOUT_MINUTES",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Present and non-blank
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| PipelineError::MissingEnv(name.to_string()))
    }

    fn parsed<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| PipelineError::invalid_env(name, e.to_string())),
            None => Ok(default),
        }
    }
}

fn parse_table_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
