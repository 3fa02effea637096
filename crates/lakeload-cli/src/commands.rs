//! Command dispatch and result printing

use crate::error::Result;
use crate::pipeline::{Deployment, Pipeline, RunSummary};
use crate::steps::deploy::StackOutputs;
use crate::steps::etl_job::{JobOutcome, JobRunSummary};
use crate::steps::reconcile::{ReconcileReport, ReconcileStatus};
use crate::steps::secret::SecretOutcome;
use crate::steps::upload::{UploadReport, UploadedObject};
use crate::Commands;
use serde::Serialize;
use serde_json::json;

/// Execute one command against `pipeline` and print its result
pub async fn execute(pipeline: &Pipeline, command: &Commands, json_output: bool) -> Result<()> {
    let printer = Printer { json: json_output };

    match command {
        Commands::Run => {
            let summary = pipeline.run_all().await?;
            printer.emit(&summary, print_run_summary)
        }

        Commands::Deploy => {
            let deployment = pipeline.deploy().await?;
            printer.emit(&deployment, print_deployment)
        }

        Commands::Outputs => {
            let outputs = pipeline.outputs().await?;
            printer.emit(&outputs, print_outputs)
        }

        Commands::Upload => {
            let outputs = pipeline.outputs().await?;
            let upload = pipeline.upload_data(&outputs).await?;
            let script = pipeline.upload_script(&outputs).await?;
            let etl_binary = pipeline.upload_etl_binary(&outputs).await?;
            printer.emit(
                &json!({ "upload": upload, "script": script, "etl_binary": etl_binary }),
                |_| {
                    print_upload(&upload);
                    print_script(script.as_ref());
                    print_etl_binary(etl_binary.as_ref());
                },
            )
        }

        Commands::PublishSecret => {
            let outcome = pipeline.publish_secret().await?;
            printer.emit(&json!({ "secret": outcome }), |_| print_secret(outcome))
        }

        Commands::Crawl => {
            let outputs = pipeline.outputs().await?;
            let path = pipeline.crawl(&outputs).await?;
            printer.emit(&json!({ "crawled_path": path }), |_| {
                println!("Crawler finished: {}", path)
            })
        }

        Commands::Etl { no_run } => {
            let outputs = pipeline.outputs().await?;
            let job = pipeline.ensure_job(&outputs).await?;
            let run = if *no_run {
                None
            } else {
                Some(pipeline.run_job().await?)
            };
            printer.emit(&json!({ "job": job, "job_run": run }), |_| {
                print_job(job);
                if let Some(run) = &run {
                    print_job_run(run);
                }
            })
        }

        Commands::Reconcile => {
            let report = pipeline.reconcile().await?;
            printer.emit(&report, print_reconciliation)
        }
    }
}

struct Printer {
    json: bool,
}

impl Printer {
    fn emit<T, F>(&self, value: &T, human: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(&T),
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

fn print_run_summary(summary: &RunSummary) {
    print_deployment(&summary.deployment);
    print_upload(&summary.upload);
    print_script(summary.script.as_ref());
    print_etl_binary(summary.etl_binary.as_ref());
    print_secret(summary.secret);
    println!("Crawler finished: {}", summary.crawled_path);
    print_job(summary.job);
    print_job_run(&summary.job_run);
    print_reconciliation(&summary.reconciliation);
    println!();
    println!(
        "Pipeline finished in {}s",
        summary.elapsed().num_seconds()
    );
}

fn print_deployment(deployment: &Deployment) {
    if deployment.created {
        println!("Stack created");
    } else {
        println!("Stack already exists");
    }
    print_outputs(&deployment.outputs);
}

fn print_outputs(outputs: &StackOutputs) {
    println!("Stack outputs:");
    for (key, value) in outputs.iter() {
        println!("  {:<30} {}", key, value);
    }
}

fn print_upload(report: &UploadReport) {
    println!("Uploaded {} data file(s)", report.uploaded.len());
    for object in &report.uploaded {
        println!("  {}", object.uri());
    }
    for path in &report.failed {
        println!("  failed: {}", path.display());
    }
}

fn print_script(script: Option<&UploadedObject>) {
    match script {
        Some(object) => println!("ETL script: {}", object.uri()),
        None => println!("ETL script upload failed"),
    }
}

fn print_etl_binary(binary: Option<&UploadedObject>) {
    if let Some(object) = binary {
        println!("ETL binary: {}", object.uri());
    }
}

fn print_secret(outcome: Option<SecretOutcome>) {
    match outcome {
        Some(SecretOutcome::Created) => println!("Secret created"),
        Some(SecretOutcome::AlreadyExists) => println!("Secret already exists"),
        None => println!("Secret publication failed"),
    }
}

fn print_job(outcome: JobOutcome) {
    match outcome {
        JobOutcome::Created => println!("ETL job created"),
        JobOutcome::AlreadyExists => println!("ETL job already exists"),
    }
}

fn print_job_run(run: &JobRunSummary) {
    let how = if run.attached { "attached" } else { "started" };
    println!("ETL job run {} ({}) succeeded", run.run_id, how);
}

fn print_reconciliation(report: &ReconcileReport) {
    println!("Row counts:");
    for table in &report.tables {
        let marker = match table.status {
            ReconcileStatus::Matched => "ok",
            ReconcileStatus::Exempt => "exempt",
        };
        println!(
            "  {:<20} local={:<10} warehouse={:<10} {}",
            table.table, table.local_rows, table.warehouse_rows, marker
        );
    }
}
