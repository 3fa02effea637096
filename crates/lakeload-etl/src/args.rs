//! Job arguments
//!
//! The runtime invokes the job as `script --KEY value ...` and adds its own
//! arguments (`--JOB_NAME`, `--job-bookmark-option`, ...) alongside the ones
//! declared on the job definition. The launcher forwards all of them,
//! `--ETL_BINARY_LOCATION` included. Only the declared keys are kept.

use crate::error::{EtlError, Result};
use clap::Parser;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "lakeload-etl", about = "Reload cataloged tables into Redshift")]
pub struct JobArgs {
    /// Secrets Manager secret holding the warehouse credentials
    #[arg(long = "SECRET_NAME")]
    pub secret_name: String,

    /// Region of the secret
    #[arg(long = "SECRET_REGION")]
    pub secret_region: String,

    /// `s3://bucket/prefix/` used to stage data before COPY
    #[arg(long = "REDSHIFT_TMP_DIR")]
    pub redshift_tmp_dir: String,

    /// Catalog database populated by the crawler
    #[arg(long = "DATABASE")]
    pub database: String,

    /// Role Redshift assumes to read the staged objects
    #[arg(long = "REDSHIFT_IAM_ROLE")]
    pub redshift_iam_role: String,

    /// Comma separated tables to reload; every table when absent
    #[arg(long = "TABLES", value_delimiter = ',')]
    pub tables: Vec<String>,
}

/// Keys [`JobArgs`] understands, without the leading `--`
pub const JOB_ARGUMENTS: &[&str] = &[
    "SECRET_NAME",
    "SECRET_REGION",
    "REDSHIFT_TMP_DIR",
    "DATABASE",
    "REDSHIFT_IAM_ROLE",
    "TABLES",
];

/// Keep the program name plus every `--KEY value` / `--KEY=value` pair whose
/// key is in `names`; everything else is dropped.
pub fn resolve_options<I, S>(argv: I, names: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut argv = argv.into_iter().map(Into::into);
    let mut kept: Vec<String> = argv.next().into_iter().collect();

    while let Some(arg) = argv.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            continue;
        };

        match flag.split_once('=') {
            Some((key, _)) => {
                if names.contains(&key) {
                    kept.push(arg.clone());
                }
            }
            None => {
                if names.contains(&flag) {
                    kept.push(arg.clone());
                    if let Some(value) = argv.next() {
                        kept.push(value);
                    }
                }
            }
        }
    }

    kept
}

impl JobArgs {
    pub fn from_argv<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kept = resolve_options(argv, JOB_ARGUMENTS);
        JobArgs::try_parse_from(kept).map_err(|e| EtlError::Arguments(e.to_string()))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_argv(std::env::args())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn runtime_argv() -> Vec<&'static str> {
        vec![
            "script",
            "--JOB_NAME",
            "lakeload-etl",
            "--SECRET_NAME",
            "lakeload/redshift",
            "--job-bookmark-option",
            "job-bookmark-disable",
            "--SECRET_REGION=eu-west-1",
            "--REDSHIFT_TMP_DIR",
            "s3://resources/temp/",
            "--DATABASE",
            "lakeload_db",
            "--REDSHIFT_IAM_ROLE",
            "arn:aws:iam::123456789012:role/copy",
            "--TempDir",
            "s3://aws-glue-temporary/",
            "--ETL_BINARY_LOCATION",
            "s3://resources/bin/lakeload-etl",
        ]
    }

    #[test]
    fn test_runtime_arguments_are_ignored() {
        let args = JobArgs::from_argv(runtime_argv()).unwrap();

        assert_eq!(args.secret_name, "lakeload/redshift");
        assert_eq!(args.secret_region, "eu-west-1");
        assert_eq!(args.redshift_tmp_dir, "s3://resources/temp/");
        assert_eq!(args.database, "lakeload_db");
        assert_eq!(args.redshift_iam_role, "arn:aws:iam::123456789012:role/copy");
        assert!(args.tables.is_empty());
    }

    #[test]
    fn test_tables_argument_is_split() {
        let mut argv = runtime_argv();
        argv.extend(["--TABLES", "fx_table,costs"]);

        let args = JobArgs::from_argv(argv).unwrap();
        assert_eq!(args.tables, vec!["fx_table", "costs"]);
    }

    #[test]
    fn test_resolve_options_keeps_known_pairs() {
        let kept = resolve_options(runtime_argv(), &["DATABASE"]);
        assert_eq!(kept, vec!["script", "--DATABASE", "lakeload_db"]);
    }

    #[test]
    fn test_missing_argument_is_reported() {
        let argv: Vec<_> = runtime_argv()
            .into_iter()
            .filter(|a| !a.contains("REDSHIFT_IAM_ROLE") && !a.contains(":role/"))
            .collect();

        let err = JobArgs::from_argv(argv).unwrap_err();
        assert!(matches!(err, EtlError::Arguments(msg) if msg.contains("REDSHIFT_IAM_ROLE")));
    }
}
