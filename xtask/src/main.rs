//! Build automation tasks for lakeload
//!
//! - `generate-cli-docs`: render the CLI reference from the clap definitions
//! - `build-etl`: build the `lakeload-etl` binary the Glue launcher runs

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::Command as Process;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for lakeload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
    /// Build a release `lakeload-etl` for the Glue Python shell hosts
    BuildEtl {
        /// Rust target triple of the job hosts
        #[arg(long, default_value = "x86_64-unknown-linux-musl")]
        target: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
        Command::BuildEtl { target } => build_etl(&target)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<lakeload_cli::Cli>();

    let content = format!(
        r#"# lakeload CLI Reference

Generated from the CLI source on {}.

## Overview

`lakeload` deploys a CloudFormation stack, uploads CSV data and the ETL
script to S3, publishes the warehouse credentials to Secrets Manager, runs
the Glue crawler and ETL job, and finally compares local and Redshift row
counts.

## Quick Start

```bash
# Run every stage
lakeload run

# Or stage by stage
lakeload deploy
lakeload upload
lakeload publish-secret
lakeload crawl
lakeload etl
lakeload reconcile
```

## Commands

{}

## Environment Variables

Required:

- `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_DEFAULT_REGION`
- `DATA_PATH` - directory holding the CSV files
- `CLOUDFORMATION_TEMPLATE_PATH`, `STACK_NAME`
- `ETL_SCRIPT_PATH`, `GLUE_JOB_NAME`
- `SECRET_NAME`
- `REDSHIFT_USERNAME`, `REDSHIFT_PASSWORD`, `REDSHIFT_DBNAME`,
  `REDSHIFT_HOST`, `REDSHIFT_PORT`, `REDSHIFT_ENGINE`

Optional:

- `AWS_ENDPOINT_URL` - alternate endpoint for every AWS client
- `POLL_INTERVAL_SECS` (default `10`)
- `STACK_MAX_WAIT_SECS` (`1800`), `CRAWLER_MAX_WAIT_SECS` (`3600`), `JOB_MAX_WAIT_SECS` (`7200`)
- `UPLOAD_POLICY`, `SECRET_POLICY` - `fatal` or `best-effort` (default)
- `RECONCILE_EXEMPT_TABLES` - comma separated tables whose count mismatches are tolerated
- `ETL_BINARY_PATH` - `lakeload-etl` build uploaded to `bin/lakeload-etl` in the resource bucket
- `GLUE_JOB_COMMAND` - `pythonshell` (default) or `glueetl`
- `GLUE_VERSION` (`3.0` for `pythonshell`, `4.0` for `glueetl`), `GLUE_PYTHON_VERSION` (`3.9` / `3`)
- `GLUE_WORKER_TYPE` (`G.1X`), `GLUE_NUMBER_OF_WORKERS` (`2`) - `glueetl` only
- `GLUE_JOB_TIMEOUT_MINUTES` (`60`)
- `REDSHIFT_IAM_ROLE` - role used by the warehouse `COPY`; defaults to the stack's role
- `ETL_TABLES` - comma separated tables the job reloads; all of them by default
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER`

Values are also read from a `.env` file in the working directory.

## Running the Rust ETL job

With the default `pythonshell` command, point `ETL_SCRIPT_PATH` at
`crates/lakeload-etl/launcher/run_lakeload_etl.py` and `ETL_BINARY_PATH` at a
Linux build of `lakeload-etl` (`cargo xtask build-etl`). The launcher downloads the binary from
`--ETL_BINARY_LOCATION` and runs it with the job arguments.

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}

fn build_etl(target: &str) -> anyhow::Result<()> {
    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let status = Process::new(cargo)
        .args(["build", "--release", "-p", "lakeload-etl", "--target", target])
        .status()?;
    anyhow::ensure!(status.success(), "cargo build failed with {}", status);

    let binary = PathBuf::from("target")
        .join(target)
        .join("release")
        .join("lakeload-etl");
    println!("Built {}", binary.display());
    println!("Set ETL_BINARY_PATH={} to upload it", binary.display());

    Ok(())
}
