//! lakeload CLI Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Orchestrates a CSV-to-warehouse load on AWS:
//!
//! - **Deploy**: validate and create the CloudFormation stack (`lakeload deploy`)
//! - **Upload**: push CSV files and the ETL script to S3 (`lakeload upload`)
//! - **Secret**: publish the warehouse credentials once (`lakeload publish-secret`)
//! - **Crawl**: run the Glue crawler over the uploaded data (`lakeload crawl`)
//! - **ETL**: create the Glue job and run it to completion (`lakeload etl`)
//! - **Reconcile**: compare local and warehouse row counts (`lakeload reconcile`)
//!
//! `lakeload run` executes all of them in that order.

pub mod commands;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod poll;
pub mod providers;
pub mod steps;

// Re-export commonly used types
pub use config::Config;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunSummary};
pub use policy::StepPolicy;
pub use poll::{PollOutcome, Poller};
pub use providers::Services;

use clap::{Parser, Subcommand};

/// lakeload - CSV to Redshift loader on AWS Glue
#[derive(Parser, Debug)]
#[command(name = "lakeload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the CLI reference as markdown and exit
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run every stage from deployment to reconciliation
    Run,

    /// Validate the template and create the stack if it does not exist
    Deploy,

    /// Show the outputs of the deployed stack
    Outputs,

    /// Upload the CSV data files and the ETL script
    Upload,

    /// Create the warehouse credential secret if it does not exist
    PublishSecret,

    /// Run the crawler and wait for it to finish
    Crawl,

    /// Ensure the ETL job exists and run it to completion
    Etl {
        /// Only create the job definition
        #[arg(long)]
        no_run: bool,
    },

    /// Compare local CSV row counts with the warehouse tables
    Reconcile,
}
