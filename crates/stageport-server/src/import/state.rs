//! Run and batch state
//!
//! A run is one JSON document keyed by run id. Batches live under
//! `batches.batch{N}`; every write goes through [`Run::apply`], which only
//! touches the fields a [`RunPatch`] sets, so writing one batch never clobbers
//! its siblings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::StateStoreError;

pub type StateResult<T> = std::result::Result<T, StateStoreError>;

/// Document key of a batch number
pub fn batch_key(batch_num: u32) -> String {
    format!("batch{}", batch_num)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    /// A closed batch is never pended or submitted again
    pub fn is_closed(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(default)]
    pub status: BatchStatus,
    #[serde(default)]
    pub files: Vec<String>,
    /// Last import id obtained for this batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    /// Every import id obtained, in submission order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<u32>,
    #[serde(default)]
    pub batches: BTreeMap<String, Batch>,
}

/// Fields to set on one batch; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPatch {
    pub status: Option<BatchStatus>,
    pub files: Option<Vec<String>>,
    /// `Some(None)` clears the recorded id
    pub import_id: Option<Option<String>>,
    pub import_ids: Option<Vec<String>>,
    /// `Some(None)` clears a recorded error
    pub error: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields to set on a run document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPatch {
    pub created_at: Option<DateTime<Utc>>,
    pub current_batch: Option<u32>,
    pub batches: BTreeMap<String, BatchPatch>,
}

impl RunPatch {
    pub fn batch(key: impl Into<String>, patch: BatchPatch) -> Self {
        Self {
            batches: BTreeMap::from([(key.into(), patch)]),
            ..Default::default()
        }
    }
}

impl Batch {
    pub fn apply(&mut self, patch: BatchPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(files) = patch.files {
            self.files = files;
        }
        if let Some(import_id) = patch.import_id {
            self.import_id = import_id;
        }
        if let Some(import_ids) = patch.import_ids {
            self.import_ids = import_ids;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = Some(updated_at);
        }
    }
}

impl Run {
    /// Structured merge shared by every document store
    pub fn apply(&mut self, patch: RunPatch) {
        if let Some(created_at) = patch.created_at {
            self.created_at = Some(created_at);
        }
        if let Some(current_batch) = patch.current_batch {
            self.current_batch = Some(current_batch);
        }
        for (key, batch) in patch.batches {
            self.batches.entry(key).or_default().apply(batch);
        }
    }

    pub fn batch(&self, batch_num: u32) -> Option<&Batch> {
        self.batches.get(&batch_key(batch_num))
    }
}

/// Persistence of run documents
#[async_trait]
pub trait RunDocumentStore: Send + Sync {
    async fn get_run(&self, run_id: &str) -> StateResult<Option<Run>>;

    /// Apply a patch, creating the document when absent
    async fn merge_run(&self, run_id: &str, patch: RunPatch) -> StateResult<Run>;

    /// Apply a patch to an existing document; [`StateStoreError::NotFound`] otherwise
    async fn update_run(&self, run_id: &str, patch: RunPatch) -> StateResult<Run>;
}

/// Run lifecycle transitions over a [`RunDocumentStore`]
///
/// The store itself does not refuse transitions; the orchestrator checks
/// [`BatchStatus::is_closed`] before pending a batch again.
#[derive(Clone)]
pub struct RunStateStore {
    docs: Arc<dyn RunDocumentStore>,
}

impl RunStateStore {
    pub fn new(docs: Arc<dyn RunDocumentStore>) -> Self {
        Self { docs }
    }

    pub async fn get_run(&self, run_id: &str) -> StateResult<Option<Run>> {
        self.docs.get_run(run_id).await
    }

    /// Current batch of a run, creating the run at `default_batch` if needed
    ///
    /// Read then merge; two callers racing on a new run both write the default.
    pub async fn ensure_run(&self, run_id: &str, default_batch: u32) -> StateResult<u32> {
        let patch = match self.docs.get_run(run_id).await? {
            Some(Run {
                current_batch: Some(current),
                ..
            }) => return Ok(current),
            Some(_) => RunPatch {
                current_batch: Some(default_batch),
                ..Default::default()
            },
            None => {
                info!(run_id, batch = default_batch, "Creating run");
                RunPatch {
                    created_at: Some(Utc::now()),
                    current_batch: Some(default_batch),
                    ..Default::default()
                }
            },
        };

        self.docs.merge_run(run_id, patch).await?;
        Ok(default_batch)
    }

    /// Raise `currentBatch` to `batch_num`; never lowers it
    pub async fn advance_current_batch(&self, run_id: &str, batch_num: u32) -> StateResult<u32> {
        let existing = self.docs.get_run(run_id).await?;

        let patch = match &existing {
            Some(run) if run.current_batch.is_some_and(|current| current >= batch_num) => {
                return Ok(run.current_batch.unwrap_or(batch_num));
            },
            Some(_) => RunPatch {
                current_batch: Some(batch_num),
                ..Default::default()
            },
            None => RunPatch {
                created_at: Some(Utc::now()),
                current_batch: Some(batch_num),
                ..Default::default()
            },
        };

        debug!(run_id, batch = batch_num, "Advancing current batch");
        self.docs.merge_run(run_id, patch).await?;
        Ok(batch_num)
    }

    /// Start a fresh submission; ids and errors of an earlier attempt are dropped
    pub async fn mark_pending(
        &self,
        run_id: &str,
        batch_key: &str,
        files: &[String],
    ) -> StateResult<Run> {
        let patch = BatchPatch {
            status: Some(BatchStatus::Pending),
            files: Some(files.to_vec()),
            import_id: Some(None),
            import_ids: Some(Vec::new()),
            error: Some(None),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(run_id, batch = batch_key, files = files.len(), "Batch pending");
        self.docs.merge_run(run_id, RunPatch::batch(batch_key, patch)).await
    }

    /// `import_id` is the last of `import_ids`
    pub async fn mark_in_progress(
        &self,
        run_id: &str,
        batch_key: &str,
        import_id: &str,
        import_ids: &[String],
    ) -> StateResult<Run> {
        let patch = BatchPatch {
            status: Some(BatchStatus::InProgress),
            import_id: Some(Some(import_id.to_string())),
            import_ids: Some(import_ids.to_vec()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(run_id, batch = batch_key, import_id, "Batch in progress");
        self.docs.update_run(run_id, RunPatch::batch(batch_key, patch)).await
    }

    /// Record a failed submission along with any ids obtained before it
    pub async fn mark_failed(
        &self,
        run_id: &str,
        batch_key: &str,
        error: &str,
        import_ids: &[String],
    ) -> StateResult<Run> {
        let patch = BatchPatch {
            status: Some(BatchStatus::Failed),
            import_id: import_ids.last().cloned().map(Some),
            import_ids: (!import_ids.is_empty()).then(|| import_ids.to_vec()),
            error: Some(Some(error.to_string())),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(run_id, batch = batch_key, error, "Batch failed");
        self.docs.update_run(run_id, RunPatch::batch(batch_key, patch)).await
    }

    pub async fn mark_completed(&self, run_id: &str, batch_key: &str) -> StateResult<Run> {
        let patch = BatchPatch {
            status: Some(BatchStatus::Completed),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(run_id, batch = batch_key, "Batch completed");
        self.docs.update_run(run_id, RunPatch::batch(batch_key, patch)).await
    }
}
