//! Execution inspection and cancellation handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use stepwise_types::workflow::{ExecutionFilter, WorkflowExecution};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/executions?workflow_name=&limit= - Most recent first.
pub async fn list_executions(
    State(state): State<AppState>,
    Query(filter): Query<ExecutionFilter>,
) -> Result<ApiResponse<Vec<WorkflowExecution>>, AppError> {
    let timer = RequestTimer::start();
    let executions = state.engine.list_executions(&filter).await?;
    Ok(timer.respond(executions).with_link("self", "/api/v1/executions"))
}

/// GET /api/v1/executions/{id} - Current state, including in-flight progress.
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<WorkflowExecution>, AppError> {
    let timer = RequestTimer::start();
    let id = parse_execution_id(&id)?;
    let execution = state.engine.get_execution(&id).await?;

    let self_link = format!("/api/v1/executions/{id}");
    let mut resp = timer.respond(execution).with_link("self", &self_link);
    if resp.data.as_ref().is_some_and(|e| !e.is_terminal()) {
        resp = resp.with_link("cancel", &format!("{self_link}/cancel"));
    }
    Ok(resp)
}

/// POST /api/v1/executions/{id}/cancel - Request cancellation of a running execution.
///
/// Returns `202 Accepted`; the execution turns `failed` once the in-progress
/// step notices.
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, ApiResponse<serde_json::Value>), AppError> {
    let timer = RequestTimer::start();
    let id = parse_execution_id(&id)?;
    state.engine.cancel(&id)?;

    let resp = timer
        .respond(json!({ "execution_id": id, "cancelled": true }))
        .with_link("execution", &format!("/api/v1/executions/{id}"));
    Ok((StatusCode::ACCEPTED, resp))
}

fn parse_execution_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid execution ID: '{raw}'")))
}
