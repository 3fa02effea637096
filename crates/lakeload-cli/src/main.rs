//! lakeload CLI - Main entry point

use clap::Parser;
use lakeload_cli::{commands, Cli, Config, Pipeline, Services};
use lakeload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = cli.command.clone() else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    // .env may carry LOG_* settings as well as the pipeline configuration
    dotenvy::dotenv().ok();

    // Logs go to stderr so results on stdout stay parseable
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("lakeload")
        .build();

    // LOG_* variables take precedence
    let log_config = match log_config.clone().with_env_overrides(|k| std::env::var(k).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging configuration: {}", e);
            log_config
        }
    };

    // The CLI still works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = run(&cli, &command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli, command: &lakeload_cli::Commands) -> lakeload_cli::Result<()> {
    let config = Config::load()?;
    info!(stack = %config.names.stack_name, region = %config.aws.region, "Configuration loaded");

    let sdk_config = config.aws.sdk_config().await;
    let services = Services::aws(&sdk_config, &config.warehouse)?;
    let pipeline = Pipeline::new(config, services);

    commands::execute(&pipeline, command, cli.json).await
}
