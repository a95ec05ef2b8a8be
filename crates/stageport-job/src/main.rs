//! Stageport Job - run one import invocation and exit

use clap::{error::ErrorKind, Parser};
use stageport_common::logging::{init_logging, LogConfig, LogLevel};
use stageport_job::{execute, Cli};
use stageport_server::import::ImportOutcome;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        },
    };

    dotenvy::dotenv().ok();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // stdout carries the summary line
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("stageport-job")
        .filter_directives("sqlx=warn,aws_config=warn")
        .console_stderr(true)
        .build()
        .merge_env();

    let _log_guard = match log_config.and_then(|config| init_logging(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        },
    };

    match execute(&cli).await {
        Ok(ImportOutcome::Submitted(batch)) => {
            info!(run_id = %batch.run_id, batch = %batch.batch_key, import_id = %batch.import_id, "Import job finished");
            match serde_json::to_string(&batch) {
                Ok(summary) => println!("{}", summary),
                Err(e) => error!("Failed to encode summary: {}", e),
            }
            ExitCode::SUCCESS
        },
        Ok(waiting @ ImportOutcome::Waiting { .. }) => {
            let message = waiting.waiting_message().unwrap_or_default();
            info!("{}", message);
            eprintln!("{}", message);
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("Import job failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}
