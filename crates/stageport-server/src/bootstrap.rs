//! Wiring shared by the server and job binaries

use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::import::{HubSpotTransport, ImportConfig, Orchestrator, PgRunStore};
use crate::storage::Storage;

/// A ready orchestrator plus the pool behind its run store
pub struct Services {
    pub orchestrator: Arc<Orchestrator>,
    pub db: PgPool,
}

/// Build the production collaborators
///
/// Local inputs (pipeline file, API key) are checked before anything touches
/// the network.
pub async fn build(config: &Config) -> anyhow::Result<Services> {
    let pipeline = ImportConfig::load(&config.pipeline_config).with_context(|| {
        format!(
            "Failed to load pipeline configuration from {}",
            config.pipeline_config.display()
        )
    })?;
    info!(
        batches = pipeline.batches.iter().count(),
        mode = ?pipeline.submission_mode,
        completeness = ?pipeline.completeness,
        "Pipeline configuration loaded"
    );

    let transport = HubSpotTransport::new(&pipeline.transport)?;

    let pool = db::create_pool(&config.database).await?;
    db::migrate(&pool).await?;

    let storage = Storage::new(config.storage.clone()).await?;

    let orchestrator = Orchestrator::new(
        Arc::new(pipeline),
        Arc::new(storage),
        Arc::new(PgRunStore::new(pool.clone())),
        Arc::new(transport),
    );

    Ok(Services {
        orchestrator: Arc::new(orchestrator),
        db: pool,
    })
}
