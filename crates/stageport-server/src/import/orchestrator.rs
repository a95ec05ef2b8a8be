//! One import invocation for a (run id, batch number)
//!
//! resolve batch -> discover -> (waiting | closed | build -> pending -> submit -> in progress)

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::config::{CompletenessPolicy, ImportConfig};
use super::discovery::FileDiscovery;
use super::error::{ImportError, ImportResult};
use super::request::ImportRequestBuilder;
use super::state::{batch_key, BatchStatus, Run, RunDocumentStore, RunStateStore};
use super::submitter::ImportSubmitter;
use super::transport::BulkImportTransport;
use crate::storage::ObjectStore;

/// Batch used when a run is created by an unattended trigger.
pub const DEFAULT_BATCH_NUM: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSelector {
    Explicit(u32),
    /// Continue from the run's `currentBatch`, creating the run if needed
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedBatch {
    pub run_id: String,
    pub batch_key: String,
    pub import_id: String,
    pub import_ids: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Submitted(SubmittedBatch),
    /// Some source types have nothing staged yet; nothing was written
    Waiting {
        run_id: String,
        batch_num: u32,
        /// In configured order
        missing: Vec<String>,
    },
}

impl ImportOutcome {
    /// `"Still waiting for files: a, b"`, or `None` once submitted
    pub fn waiting_message(&self) -> Option<String> {
        match self {
            ImportOutcome::Waiting { missing, .. } => Some(format!(
                "Still waiting for files: {}",
                missing.join(", ")
            )),
            ImportOutcome::Submitted(_) => None,
        }
    }
}

pub struct Orchestrator {
    config: Arc<ImportConfig>,
    discovery: FileDiscovery,
    submitter: ImportSubmitter,
    state: RunStateStore,
}

impl Orchestrator {
    pub fn new(
        config: Arc<ImportConfig>,
        store: Arc<dyn ObjectStore>,
        docs: Arc<dyn RunDocumentStore>,
        transport: Arc<dyn BulkImportTransport>,
    ) -> Self {
        let discovery = FileDiscovery::new(
            store.clone(),
            config.batches.clone(),
            config.staging.clone(),
        );
        let submitter = ImportSubmitter::new(transport, store, config.staging.clone());

        Self {
            config,
            discovery,
            submitter,
            state: RunStateStore::new(docs),
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn state(&self) -> &RunStateStore {
        &self.state
    }

    pub async fn run_status(&self, run_id: &str) -> ImportResult<Option<Run>> {
        Ok(self.state.get_run(run_id).await?)
    }

    async fn closed_status(&self, run_id: &str, key: &str) -> ImportResult<Option<BatchStatus>> {
        let run = self.state.get_run(run_id).await?;
        Ok(run
            .and_then(|run| run.batches.get(key).map(|batch| batch.status))
            .filter(BatchStatus::is_closed))
    }

    #[instrument(skip(self))]
    pub async fn run(&self, run_id: &str, selector: BatchSelector) -> ImportResult<ImportOutcome> {
        let batch_num = match selector {
            BatchSelector::Explicit(batch_num) => batch_num,
            BatchSelector::Resume => self.state.ensure_run(run_id, DEFAULT_BATCH_NUM).await?,
        };

        let discovered = self.discovery.discover(batch_num, run_id).await?;

        let must_wait = match self.config.completeness {
            CompletenessPolicy::Strict => !discovered.is_complete(),
            CompletenessPolicy::Lenient => false,
        };
        if must_wait || discovered.resolved_files.is_empty() {
            info!(run_id, batch = batch_num, missing = ?discovered.missing_source_types, "Batch not ready");
            return Ok(ImportOutcome::Waiting {
                run_id: run_id.to_string(),
                batch_num,
                missing: discovered.missing_source_types,
            });
        }
        if !discovered.is_complete() {
            warn!(
                run_id,
                batch = batch_num,
                missing = ?discovered.missing_source_types,
                "Proceeding with a partial batch"
            );
        }

        let key = batch_key(batch_num);
        if let Some(status) = self.closed_status(run_id, &key).await? {
            info!(run_id, batch = %key, %status, "Batch already closed");
            return Err(ImportError::BatchClosed {
                run_id: run_id.to_string(),
                batch_key: key,
                status,
            });
        }

        let files = discovered.resolved_files;
        let descriptors = ImportRequestBuilder::new(&self.config.schemas).build(
            run_id,
            batch_num,
            &files,
            self.config.submission_mode,
        )?;

        self.state.advance_current_batch(run_id, batch_num).await?;
        self.state.mark_pending(run_id, &key, &files).await?;

        let report = match self.submitter.submit(&descriptors).await {
            Ok(report) => report,
            Err(err) => {
                if self.config.record_failures {
                    if let Err(state_err) = self
                        .state
                        .mark_failed(run_id, &key, &err.to_string(), &err.succeeded_ids())
                        .await
                    {
                        warn!(run_id, batch = %key, "Could not record failure: {}", state_err);
                    }
                }
                return Err(ImportError::Submission(err));
            },
        };

        let import_ids = report.import_ids();
        self.state
            .mark_in_progress(run_id, &key, &report.import_id, &import_ids)
            .await?;

        info!(run_id, batch = %key, import_id = %report.import_id, "Batch submitted");
        Ok(ImportOutcome::Submitted(SubmittedBatch {
            run_id: run_id.to_string(),
            batch_key: key,
            import_id: report.import_id,
            import_ids,
            files,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_message_keeps_configured_order() {
        let outcome = ImportOutcome::Waiting {
            run_id: "2025-05-22".to_string(),
            batch_num: 1,
            missing: vec!["test1".to_string(), "test0".to_string()],
        };
        assert_eq!(
            outcome.waiting_message().unwrap(),
            "Still waiting for files: test1, test0"
        );
    }
}
