//! Import trigger and run status handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::response::{MessageBody, StartImportResponse};
use super::AppState;
use crate::error::AppError;
use crate::import::{orchestrator::DEFAULT_BATCH_NUM, BatchSelector, ImportOutcome};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImportQuery {
    pub run_id: Option<String>,
    pub batch_num: Option<String>,
}

/// Today's date in UTC, the run id of an unparameterized trigger
pub fn default_run_id() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn parse_batch_num(raw: Option<&str>) -> Result<u32, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_BATCH_NUM),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Unknown batchNum {}", raw))),
    }
}

/// `GET|POST /imports/start?runId=&batchNum=`
pub async fn start_import(
    State(state): State<AppState>,
    Query(query): Query<StartImportQuery>,
) -> Result<Response, AppError> {
    let run_id = query
        .run_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(default_run_id);
    let batch_num = parse_batch_num(query.batch_num.as_deref())?;

    let outcome = state
        .orchestrator
        .run(&run_id, BatchSelector::Explicit(batch_num))
        .await?;

    let response = match outcome {
        ImportOutcome::Submitted(submitted) => {
            (StatusCode::OK, Json(StartImportResponse::from(submitted))).into_response()
        },
        waiting @ ImportOutcome::Waiting { .. } => {
            let message = waiting.waiting_message().unwrap_or_default();
            (StatusCode::ACCEPTED, Json(MessageBody { message })).into_response()
        },
    };

    Ok(response)
}

/// `GET /runs/:run_id`
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Response, AppError> {
    match state.orchestrator.run_status(&run_id).await? {
        Some(run) => Ok(Json(run).into_response()),
        None => Err(AppError::NotFound(format!("Run '{}' not found", run_id))),
    }
}
