//! Shared fakes and helpers for the import pipeline integration tests
//!
//! Everything runs in process: staged files live in a [`MemoryObjectStore`],
//! run documents in a [`MemoryRunStore`], and submissions are recorded by a
//! [`RecordingTransport`] instead of reaching the bulk-import service.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use stageport_server::{
    api::{self, AppState},
    import::{
        BulkImportTransport, FilePart, ImportConfig, ImportJobDescriptor, MemoryRunStore,
        Orchestrator, Run, RunDocumentStore, RunPatch, StateResult, StateStoreError,
        TransportError,
    },
    storage::memory::MemoryObjectStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;
use tower::ServiceExt;

pub const RUN_ID: &str = "2025-05-22";

/// Batches 1 = [test0, test1], 2 = [widgets], 3 = [test0, orders]
pub fn pipeline(mode: &str, completeness: &str, record_failures: bool) -> ImportConfig {
    let toml = format!(
        r#"
        submission_mode = "{mode}"
        completeness = "{completeness}"
        record_failures = {record_failures}

        [batches]
        1 = ["test0", "test1"]
        2 = ["widgets"]
        3 = ["test0", "orders"]

        [[schemas.test0]]
        columnObjectTypeId = "0-8"
        columnName = "Key_Number"
        propertyName = "key_number"

        [[schemas.test0]]
        columnObjectTypeId = "0-3"
        columnName = "Order_Number"
        propertyName = "order_number"

        [[schemas.test1]]
        columnName = "Legacy"
        ignored = true

        [[schemas.test1]]
        columnObjectTypeId = "0-1"
        columnName = "Rep_Email"
        propertyName = "email"

        [[schemas.widgets]]
        columnName = "A"
        ignored = true

        [[schemas.widgets]]
        columnName = "B"
        propertyName = "x"

        [[schemas.orders]]
        columnObjectTypeId = "0-3"
        columnName = "Order_Number"
        propertyName = "order_number"
        idColumnType = "HUBSPOT_ALTERNATE_ID"
        "#
    );

    ImportConfig::from_toml_str(&toml).unwrap()
}

/// Staging area holding `uploads/{name}` for every name
pub fn staged(names: &[&str]) -> Arc<MemoryObjectStore> {
    Arc::new(MemoryObjectStore::with_objects(names.iter().map(|name| {
        (
            format!("uploads/{}", name),
            format!("Key_Number,Order_Number\n1,{}\n", name),
        )
    })))
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub job_name: String,
    pub files: Vec<String>,
    pub request: Value,
}

/// Accepts every job, except those carrying a rejected file
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    rejected_files: Vec<String>,
    barrier: Option<Arc<Barrier>>,
    next_id: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(files: &[&str]) -> Self {
        Self {
            rejected_files: files.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Every submission waits until `barrier` is full
    pub fn gated(barrier: Arc<Barrier>) -> Self {
        Self {
            barrier: Some(barrier),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BulkImportTransport for RecordingTransport {
    async fn submit(
        &self,
        descriptor: &ImportJobDescriptor,
        files: Vec<FilePart>,
    ) -> Result<String, TransportError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
        self.calls.lock().unwrap().push(RecordedCall {
            job_name: descriptor.name.clone(),
            files: names.clone(),
            request: serde_json::to_value(descriptor).unwrap(),
        });

        if let Some(rejected) = names.iter().find(|n| self.rejected_files.contains(n)) {
            return Err(TransportError::Rejected {
                status: 400,
                body: format!("{{\"message\":\"invalid file {}\"}}", rejected),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("import-{}", id))
    }
}

/// Document store that is always unreachable
pub struct UnreachableRunStore;

#[async_trait]
impl RunDocumentStore for UnreachableRunStore {
    async fn get_run(&self, _run_id: &str) -> StateResult<Option<Run>> {
        Err(StateStoreError::Backend("connection refused".to_string()))
    }

    async fn merge_run(&self, _run_id: &str, _patch: RunPatch) -> StateResult<Run> {
        Err(StateStoreError::Backend("connection refused".to_string()))
    }

    async fn update_run(&self, _run_id: &str, _patch: RunPatch) -> StateResult<Run> {
        Err(StateStoreError::Backend("connection refused".to_string()))
    }
}

pub struct Harness {
    pub objects: Arc<MemoryObjectStore>,
    pub docs: Arc<MemoryRunStore>,
    pub transport: Arc<RecordingTransport>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(config: ImportConfig, objects: Arc<MemoryObjectStore>) -> Self {
        Self::with_transport(config, objects, RecordingTransport::new())
    }

    pub fn with_transport(
        config: ImportConfig,
        objects: Arc<MemoryObjectStore>,
        transport: RecordingTransport,
    ) -> Self {
        let docs = Arc::new(MemoryRunStore::new());
        let transport = Arc::new(transport);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(config),
            objects.clone(),
            docs.clone(),
            transport.clone(),
        ));

        Self {
            objects,
            docs,
            transport,
            orchestrator,
        }
    }

    pub fn router(&self) -> Router {
        api::router(AppState::new(self.orchestrator.clone()))
    }

    pub async fn run_document(&self, run_id: &str) -> Option<Run> {
        self.docs.get_run(run_id).await.unwrap()
    }
}

/// Send a request through the router and decode the JSON body
pub async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, body)
}
