//! Execution store trait definition.
//!
//! Defines the storage interface for workflow execution records. The engine
//! writes through it at creation, after every step, and at the terminal
//! transition; callers read through it for status and history.

use stepwise_types::error::RepositoryError;
use stepwise_types::workflow::{ExecutionFilter, WorkflowExecution};
use uuid::Uuid;

/// Repository trait for execution records.
///
/// Implementations must serialize concurrent `put`/`get` access; a single
/// key write is the only atomicity required.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ExecutionStore: Send + Sync {
    /// Insert or replace an execution by its ID.
    fn put(
        &self,
        execution: &WorkflowExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution by its ID.
    fn get(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowExecution>, RepositoryError>> + Send;

    /// List executions matching `filter`, most recent first.
    fn list(
        &self,
        filter: &ExecutionFilter,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, RepositoryError>> + Send;
}
