//! Sequential job submission

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::discovery::StagingLayout;
use super::error::SubmissionError;
use super::request::ImportJobDescriptor;
use super::transport::{BulkImportTransport, FilePart};
use crate::storage::ObjectStore;

/// A job the bulk-import service accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub job_name: String,
    pub files: Vec<String>,
    pub import_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Id of the last accepted job
    pub import_id: String,
    pub jobs: Vec<SubmittedJob>,
}

impl SubmissionReport {
    pub fn import_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.import_id.clone()).collect()
    }
}

pub struct ImportSubmitter {
    transport: Arc<dyn BulkImportTransport>,
    store: Arc<dyn ObjectStore>,
    layout: StagingLayout,
}

impl ImportSubmitter {
    pub fn new(
        transport: Arc<dyn BulkImportTransport>,
        store: Arc<dyn ObjectStore>,
        layout: StagingLayout,
    ) -> Self {
        Self {
            transport,
            store,
            layout,
        }
    }

    /// Submit descriptors in order, stopping at the first failure
    ///
    /// Jobs accepted before a failure are not rolled back; they are reported
    /// in [`SubmissionError::succeeded`].
    #[instrument(skip_all, fields(jobs = descriptors.len()))]
    pub async fn submit(
        &self,
        descriptors: &[ImportJobDescriptor],
    ) -> Result<SubmissionReport, SubmissionError> {
        let mut jobs: Vec<SubmittedJob> = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let files: Vec<String> = descriptor.file_names().map(str::to_string).collect();
            let failed_file = match files.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            };

            let result = match self.read_parts(&files).await {
                Ok(parts) => self
                    .transport
                    .submit(descriptor, parts)
                    .await
                    .map_err(|e| e.to_string()),
                Err(detail) => Err(detail),
            };

            match result {
                Ok(import_id) => {
                    info!(job = %descriptor.name, import_id = %import_id, "Import job submitted");
                    jobs.push(SubmittedJob {
                        job_name: descriptor.name.clone(),
                        files,
                        import_id,
                    });
                },
                Err(detail) => {
                    error!(
                        job = %descriptor.name,
                        file = ?failed_file,
                        submitted = jobs.len(),
                        "Import job failed: {}",
                        detail
                    );
                    return Err(SubmissionError {
                        failed_file,
                        detail,
                        succeeded: jobs,
                    });
                },
            }
        }

        match jobs.last() {
            Some(last) => Ok(SubmissionReport {
                import_id: last.import_id.clone(),
                jobs,
            }),
            None => Err(SubmissionError {
                failed_file: None,
                detail: "no import jobs to submit".to_string(),
                succeeded: Vec::new(),
            }),
        }
    }

    async fn read_parts(&self, files: &[String]) -> Result<Vec<FilePart>, String> {
        let mut parts = Vec::with_capacity(files.len());
        for file_name in files {
            let key = self.layout.object_key(file_name);
            let content = self
                .store
                .read_object(&key)
                .await
                .map_err(|e| format!("failed to read staged file {}: {:#}", file_name, e))?;
            parts.push(FilePart {
                file_name: file_name.clone(),
                content,
            });
        }
        Ok(parts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::import::config::SubmissionMode;
    use crate::import::request::ImportRequestBuilder;
    use crate::import::schema::{ColumnMapping, SchemaRegistry};
    use crate::import::transport::TransportError;
    use crate::storage::memory::MemoryObjectStore;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Accepts every job except those touching `reject`
    struct ScriptedTransport {
        reject: Option<String>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedTransport {
        fn new(reject: Option<&str>) -> Self {
            Self {
                reject: reject.map(str::to_string),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BulkImportTransport for ScriptedTransport {
        async fn submit(
            &self,
            descriptor: &ImportJobDescriptor,
            files: Vec<FilePart>,
        ) -> Result<String, TransportError> {
            let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
            let mut calls = self.calls.lock().unwrap();
            calls.push((descriptor.name.clone(), names.clone()));

            if self.reject.as_ref().is_some_and(|r| names.contains(r)) {
                return Err(TransportError::Rejected {
                    status: 400,
                    body: "bad mapping".to_string(),
                });
            }
            Ok(format!("{}", 100 + calls.len()))
        }
    }

    const FILES: [&str; 3] = [
        "a____2025-05-22.txt",
        "b____2025-05-22.txt",
        "c____2025-05-22.txt",
    ];

    fn descriptors(mode: SubmissionMode) -> Vec<ImportJobDescriptor> {
        let registry = SchemaRegistry::new(
            ["a", "b", "c"]
                .iter()
                .map(|t| (t.to_string(), vec![ColumnMapping::ignored("X")]))
                .collect::<BTreeMap<_, _>>(),
        )
        .unwrap();
        let files: Vec<String> = FILES.iter().map(|f| f.to_string()).collect();
        ImportRequestBuilder::new(&registry)
            .build("2025-05-22", 1, &files, mode)
            .unwrap()
    }

    fn store() -> Arc<MemoryObjectStore> {
        Arc::new(MemoryObjectStore::with_objects(
            FILES.iter().map(|f| (format!("uploads/{}", f), "X\n1\n")),
        ))
    }

    fn submitter(transport: Arc<ScriptedTransport>, store: Arc<MemoryObjectStore>) -> ImportSubmitter {
        ImportSubmitter::new(transport, store, StagingLayout::new("uploads/", ".txt"))
    }

    #[tokio::test]
    async fn test_combined_submits_once_with_every_file() {
        let transport = Arc::new(ScriptedTransport::new(None));
        let report = submitter(transport.clone(), store())
            .submit(&descriptors(SubmissionMode::Combined))
            .await
            .unwrap();

        assert_eq!(report.import_id, "101");
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, FILES);
    }

    #[tokio::test]
    async fn test_per_file_reports_last_id() {
        let transport = Arc::new(ScriptedTransport::new(None));
        let report = submitter(transport, store())
            .submit(&descriptors(SubmissionMode::PerFile))
            .await
            .unwrap();

        assert_eq!(report.import_ids(), vec!["101", "102", "103"]);
        assert_eq!(report.import_id, "103");
    }

    #[tokio::test]
    async fn test_per_file_stops_at_first_failure() {
        let transport = Arc::new(ScriptedTransport::new(Some("b____2025-05-22.txt")));
        let err = submitter(transport.clone(), store())
            .submit(&descriptors(SubmissionMode::PerFile))
            .await
            .unwrap_err();

        assert_eq!(err.failed_file.as_deref(), Some("b____2025-05-22.txt"));
        assert_eq!(err.succeeded_ids(), vec!["101"]);
        assert!(err.detail.contains("bad mapping"));
        // c was never attempted
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_combined_failure_names_no_file() {
        let transport = Arc::new(ScriptedTransport::new(Some("a____2025-05-22.txt")));
        let err = submitter(transport, store())
            .submit(&descriptors(SubmissionMode::Combined))
            .await
            .unwrap_err();

        assert_eq!(err.failed_file, None);
        assert!(err.succeeded.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_that_job() {
        let transport = Arc::new(ScriptedTransport::new(None));
        let store = Arc::new(MemoryObjectStore::with_objects([(
            "uploads/a____2025-05-22.txt",
            "X\n1\n",
        )]));

        let err = submitter(transport.clone(), store)
            .submit(&descriptors(SubmissionMode::PerFile))
            .await
            .unwrap_err();

        assert_eq!(err.failed_file.as_deref(), Some("b____2025-05-22.txt"));
        assert_eq!(err.succeeded_ids(), vec!["101"]);
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }
}
