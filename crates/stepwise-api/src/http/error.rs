//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use stepwise_core::workflow::executor::ExecutorError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Engine errors (unknown workflow or execution, store faults).
    Executor(ExecutorError),
    /// Malformed request input.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ExecutorError> for AppError {
    fn from(e: ExecutorError) -> Self {
        AppError::Executor(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Executor(e @ ExecutorError::WorkflowNotFound(_)) => {
                (StatusCode::NOT_FOUND, "WORKFLOW_NOT_FOUND", e.to_string())
            }
            AppError::Executor(e @ ExecutorError::ExecutionNotFound(_)) => {
                (StatusCode::NOT_FOUND, "EXECUTION_NOT_FOUND", e.to_string())
            }
            AppError::Executor(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string(), 0);
        (status, body).into_response()
    }
}
