pub mod imports;
pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::db;
use crate::import::Orchestrator;
use crate::middleware;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Checked by `/health` when the run store is Postgres
    pub db: Option<PgPool>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            db: None,
        }
    }

    pub fn with_db(mut self, db: PgPool) -> Self {
        self.db = Some(db);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/imports/start",
            get(imports::start_import).post(imports::start_import),
        )
        .route("/runs/:run_id", get(imports::get_run))
        .with_state(state)
        .layer(middleware::tracing_layer())
}

async fn health(State(state): State<AppState>) -> Response {
    let Some(pool) = &state.db else {
        return (StatusCode::OK, Json(json!({ "status": "healthy" }))).into_response();
    };

    match db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        },
    }
}
