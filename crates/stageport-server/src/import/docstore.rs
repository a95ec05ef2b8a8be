//! Run-document stores
//!
//! Both stores apply patches with [`Run::apply`]; they differ only in where
//! the merged document lives.

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::instrument;

use super::error::StateStoreError;
use super::state::{Run, RunDocumentStore, RunPatch, StateResult};

/// Documents in the `import_runs` table
#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read-modify-write under a row lock
    ///
    /// A merge inserts an empty document first so that concurrent writers of a
    /// new run serialize on the same row instead of overwriting each other.
    async fn write(&self, run_id: &str, patch: RunPatch, create: bool) -> StateResult<Run> {
        let mut tx = self.pool.begin().await?;

        if create {
            sqlx::query("INSERT INTO import_runs (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
                .bind(run_id)
                .execute(&mut *tx)
                .await?;
        }

        let current: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT document FROM import_runs WHERE id = $1 FOR UPDATE")
                .bind(run_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((document,)) = current else {
            return Err(StateStoreError::NotFound(run_id.to_string()));
        };
        let mut run = decode(run_id, document)?;
        run.apply(patch);

        sqlx::query("UPDATE import_runs SET document = $2, updated_at = NOW() WHERE id = $1")
            .bind(run_id)
            .bind(Json(&run))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(run)
    }
}

fn decode(run_id: &str, document: serde_json::Value) -> StateResult<Run> {
    serde_json::from_value(document).map_err(|e| StateStoreError::Malformed {
        run_id: run_id.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl RunDocumentStore for PgRunStore {
    #[instrument(skip(self))]
    async fn get_run(&self, run_id: &str) -> StateResult<Option<Run>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT document FROM import_runs WHERE id = $1")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(document,)| decode(run_id, document)).transpose()
    }

    #[instrument(skip(self, patch))]
    async fn merge_run(&self, run_id: &str, patch: RunPatch) -> StateResult<Run> {
        self.write(run_id, patch, true).await
    }

    #[instrument(skip(self, patch))]
    async fn update_run(&self, run_id: &str, patch: RunPatch) -> StateResult<Run> {
        self.write(run_id, patch, false).await
    }
}

/// In-process store for tests and local runs
///
/// Counts reads and writes so callers can assert that nothing touched it.
#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<String, Run>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> usize {
        self.reads() + self.writes()
    }
}

#[async_trait]
impl RunDocumentStore for MemoryRunStore {
    async fn get_run(&self, run_id: &str) -> StateResult<Option<Run>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.runs.lock().await.get(run_id).cloned())
    }

    async fn merge_run(&self, run_id: &str, patch: RunPatch) -> StateResult<Run> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut runs = self.runs.lock().await;
        let run = runs.entry(run_id.to_string()).or_default();
        run.apply(patch);
        Ok(run.clone())
    }

    async fn update_run(&self, run_id: &str, patch: RunPatch) -> StateResult<Run> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut runs = self.runs.lock().await;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| StateStoreError::NotFound(run_id.to_string()))?;
        run.apply(patch);
        Ok(run.clone())
    }
}
