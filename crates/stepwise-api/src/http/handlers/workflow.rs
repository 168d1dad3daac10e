//! Workflow definition listing and run handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use stepwise_types::workflow::{WorkflowExecution, WorkflowSummary};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    /// Start the run in the background and return immediately.
    #[serde(default)]
    pub detach: bool,
}

/// GET /api/v1/workflows - Summaries of all registered definitions.
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<WorkflowSummary>>, AppError> {
    let timer = RequestTimer::start();
    let summaries = state.engine.list_workflow_definitions();
    Ok(timer.respond(summaries).with_link("self", "/api/v1/workflows"))
}

/// POST /api/v1/workflows/{name}/run - Run a workflow.
///
/// The body is the params object (empty body means no params). Without
/// `detach` the call returns once the execution is terminal; a failed
/// workflow is still `200` with `status: failed` in the data. With
/// `?detach=true` the run is spawned and the `running` snapshot comes back
/// as `202 Accepted`.
pub async fn run_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RunQuery>,
    body: Bytes,
) -> Result<(StatusCode, ApiResponse<WorkflowExecution>), AppError> {
    let timer = RequestTimer::start();
    let params = parse_params(&body)?;

    let (status, execution) = if query.detach {
        let execution = state.engine.start_workflow(&name, params).await?;
        (StatusCode::ACCEPTED, execution)
    } else {
        let execution = state.engine.run_workflow(&name, params).await?;
        (StatusCode::OK, execution)
    };

    let self_link = format!("/api/v1/executions/{}", execution.execution_id);
    let resp = timer
        .respond(execution)
        .with_link("self", &self_link)
        .with_link("workflow", &format!("/api/v1/workflows/{name}/run"));
    Ok((status, resp))
}

fn parse_params(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(AppError::Validation(
            "request body must be a JSON object of params".to_string(),
        )),
        Err(e) => Err(AppError::Validation(format!("invalid JSON body: {e}"))),
    }
}
