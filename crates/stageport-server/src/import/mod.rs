//! Staged-file import pipeline
//!
//! Watches the staging area for the file groups of a (run, batch), turns them
//! into bulk-import jobs and tracks progress in a per-run document.
//!
//! # Architecture
//!
//! - **schema**: column mappings keyed by source type
//! - **config**: validated pipeline configuration (batches, schemas, mode, policy)
//! - **discovery**: staged-file grouping and completeness
//! - **request**: import-job descriptors built from discovered files
//! - **submitter**: sequential submission through a [`BulkImportTransport`]
//! - **transport**: multipart HTTP client for the bulk-import API
//! - **state**: typed run/batch documents and their transitions
//! - **docstore**: run-document store adapters (Postgres, in-memory)
//! - **orchestrator**: one invocation for a (run id, batch number)

pub mod config;
pub mod discovery;
pub mod docstore;
pub mod error;
pub mod orchestrator;
pub mod request;
pub mod schema;
pub mod state;
pub mod submitter;
pub mod transport;

pub use config::{BatchCatalog, CompletenessPolicy, ImportConfig, SubmissionMode, TransportConfig};
pub use discovery::{DiscoveredFiles, FileDiscovery, StagingLayout};
pub use docstore::{MemoryRunStore, PgRunStore};
pub use error::{ImportError, ImportResult, StateStoreError, SubmissionError};
pub use orchestrator::{BatchSelector, ImportOutcome, Orchestrator, SubmittedBatch};
pub use request::{ImportJobDescriptor, ImportRequestBuilder};
pub use schema::{ColumnMapping, SchemaRegistry};
pub use state::{
    batch_key, Batch, BatchPatch, BatchStatus, Run, RunDocumentStore, RunPatch, RunStateStore,
    StateResult,
};
pub use submitter::{ImportSubmitter, SubmissionReport, SubmittedJob};
pub use transport::{BulkImportTransport, FilePart, HubSpotTransport, TransportError};
