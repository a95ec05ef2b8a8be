//! Unattended entrypoint: one import invocation per process
//!
//! Without `--batch-num` the batch is resumed from the run's `currentBatch`,
//! which is created at batch 1 for a new run.

use clap::Parser;
use stageport_server::{
    bootstrap,
    config::Config,
    import::{BatchSelector, ImportOutcome},
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stageport-job")]
#[command(author, version, about = "Submit one batch of staged files for import")]
pub struct Cli {
    /// Run identifier; defaults to today's date (UTC)
    #[arg(long, env = "STAGEPORT_RUN_ID")]
    pub run_id: Option<String>,

    /// Batch to submit; resumes the run's current batch when omitted
    #[arg(long)]
    pub batch_num: Option<u32>,

    /// Pipeline file; overrides STAGEPORT_PIPELINE_CONFIG
    #[arg(long)]
    pub pipeline_config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run_id(&self) -> String {
        self.run_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string())
    }

    pub fn selector(&self) -> BatchSelector {
        match self.batch_num {
            Some(batch_num) => BatchSelector::Explicit(batch_num),
            None => BatchSelector::Resume,
        }
    }
}

pub async fn execute(cli: &Cli) -> anyhow::Result<ImportOutcome> {
    let mut config = Config::load()?;
    if let Some(path) = &cli.pipeline_config {
        config.pipeline_config = path.clone();
    }

    let services = bootstrap::build(&config).await?;

    let run_id = cli.run_id();
    info!(run_id = %run_id, selector = ?cli.selector(), "Starting import job");

    Ok(services.orchestrator.run(&run_id, cli.selector()).await?)
}
