use thiserror::Error;
use uuid::Uuid;

/// Illegal state change on a `WorkflowExecution`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("execution {execution_id} is already {status}")]
    AlreadyTerminal { execution_id: Uuid, status: String },

    #[error("execution already recorded all {total} steps")]
    TooManySteps { total: usize },
}

/// Errors from execution store operations (used by trait definitions in stepwise-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store unavailable")]
    Unavailable,
}
