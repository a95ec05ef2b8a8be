//! Import pipeline errors
//!
//! An incomplete file set is not an error: it is reported as
//! [`ImportOutcome::Waiting`](super::ImportOutcome::Waiting).

use thiserror::Error;

use super::state::BatchStatus;
use super::submitter::SubmittedJob;

/// Result type alias for import operations
pub type ImportResult<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    /// The batch number has no configured source types
    #[error("Unknown batchNum {0}")]
    UnknownBatch(u32),

    /// A file's source-type prefix has no schema entry
    #[error(
        "Unknown source type '{source_type}'{}",
        .file_name.as_ref().map(|f| format!(" (file {})", f)).unwrap_or_default()
    )]
    UnknownSourceType {
        source_type: String,
        file_name: Option<String>,
    },

    /// The batch already finished; it is not submitted a second time
    #[error("Batch {batch_key} of run '{run_id}' is already {status}")]
    BatchClosed {
        run_id: String,
        batch_key: String,
        status: BatchStatus,
    },

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    StateStore(#[from] StateStoreError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ImportError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Storage failures are carried with their full context chain
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}

/// The bulk-import collaborator rejected or failed a request
///
/// Submission stops at the first failure. `succeeded` lists the jobs that were
/// accepted before it; those are not rolled back.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "Bulk import submission failed{}: {detail}",
    .failed_file.as_ref().map(|f| format!(" for {}", f)).unwrap_or_default()
)]
pub struct SubmissionError {
    pub failed_file: Option<String>,
    pub detail: String,
    pub succeeded: Vec<SubmittedJob>,
}

impl SubmissionError {
    /// Import ids obtained before the failure, in submission order
    pub fn succeeded_ids(&self) -> Vec<String> {
        self.succeeded.iter().map(|job| job.import_id.clone()).collect()
    }
}

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Run document '{0}' does not exist")]
    NotFound(String),

    #[error("Run document '{run_id}' is malformed: {reason}")]
    Malformed { run_id: String, reason: String },

    #[error("Document store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StateStoreError {
    fn from(err: sqlx::Error) -> Self {
        StateStoreError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_batch_message() {
        assert_eq!(ImportError::UnknownBatch(99).to_string(), "Unknown batchNum 99");
    }

    #[test]
    fn test_batch_closed_message() {
        let err = ImportError::BatchClosed {
            run_id: "2025-05-22".to_string(),
            batch_key: "batch2".to_string(),
            status: BatchStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Batch batch2 of run '2025-05-22' is already completed"
        );
    }

    #[test]
    fn test_unknown_source_type_names_the_file() {
        let err = ImportError::UnknownSourceType {
            source_type: "gadgets".to_string(),
            file_name: Some("gadgets____2025-05-22.txt".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Unknown source type 'gadgets' (file gadgets____2025-05-22.txt)"
        );
    }

    #[test]
    fn test_submission_error_lists_prior_ids() {
        let err = SubmissionError {
            failed_file: Some("b____2025-05-22.txt".to_string()),
            detail: "HTTP 400: bad mapping".to_string(),
            succeeded: vec![SubmittedJob {
                job_name: "Import 2025-05-22 - batch1 - a____2025-05-22.txt".to_string(),
                files: vec!["a____2025-05-22.txt".to_string()],
                import_id: "101".to_string(),
            }],
        };

        assert_eq!(err.succeeded_ids(), vec!["101".to_string()]);
        assert_eq!(
            err.to_string(),
            "Bulk import submission failed for b____2025-05-22.txt: HTTP 400: bad mapping"
        );
    }
}
