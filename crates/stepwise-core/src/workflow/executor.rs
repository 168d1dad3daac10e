//! Workflow engine: sequential step execution with per-step policies.
//!
//! `WorkflowEngine` owns the registered definitions, the step runner and the
//! execution store, and exposes the caller-facing operations.
//!
//! # Execution flow
//!
//! 1. Create a `running` `WorkflowExecution` (context = copy of params) and
//!    store it.
//! 2. For each step in declaration order: run it through the retry handler,
//!    append its `StepResult`, merge a successful output into the context,
//!    store the execution.
//! 3. A step that fails for good under `on_error: abort` (or any cancelled
//!    step) marks the execution `failed` with the step's message verbatim;
//!    no later step runs.
//! 4. Otherwise resolve the `return` mapping against the final context and
//!    mark the execution `completed`.
//!
//! A failed workflow is returned as `Ok(execution)` with `status: failed`;
//! `ExecutorError` is reserved for caller mistakes and store faults.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{Map, Value};
use stepwise_types::error::{RepositoryError, TransitionError};
use stepwise_types::workflow::{
    ExecutionFilter, StepResult, WorkflowDefinition, WorkflowExecution, WorkflowSummary,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::repository::execution::ExecutionStore;
use crate::tool::ToolInvoker;

use super::context::ContextStore;
use super::definition::{validate_definition, WorkflowError};
use super::resolve::resolve;
use super::retry::RetryHandler;
use super::step_runner::{StepError, StepRunner};

// ---------------------------------------------------------------------------
// ExecutorError
// ---------------------------------------------------------------------------

/// Errors surfaced by the caller-facing engine API.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("workflow '{0}' is not registered")]
    WorkflowNotFound(String),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    #[error("execution store error: {0}")]
    Store(#[from] RepositoryError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Sequential workflow engine.
///
/// Generic over `S: ExecutionStore` for storage flexibility; the default
/// deployment uses the in-memory `ExecutionRegistry`.
pub struct WorkflowEngine<S: ExecutionStore> {
    definitions: DashMap<String, Arc<WorkflowDefinition>>,
    runner: StepRunner,
    store: S,
    /// Cancellation tokens of in-flight executions keyed by execution ID.
    cancellation_tokens: DashMap<Uuid, CancellationToken>,
}

impl<S: ExecutionStore> WorkflowEngine<S> {
    /// Create an engine that records executions in `store` and sends
    /// remote-tool steps to `invoker`.
    pub fn new(store: S, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            definitions: DashMap::new(),
            runner: StepRunner::new(invoker),
            store,
            cancellation_tokens: DashMap::new(),
        }
    }

    /// Deadline for steps that do not set `timeout_secs`.
    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.runner = self.runner.with_default_timeout(timeout);
        self
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// Validate and register a definition. Names must be unique.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<(), WorkflowError> {
        validate_definition(&definition)?;

        match self.definitions.entry(definition.name.clone()) {
            Entry::Occupied(_) => Err(WorkflowError::DuplicateName(definition.name)),
            Entry::Vacant(slot) => {
                tracing::info!(
                    workflow = definition.name.as_str(),
                    steps = definition.steps.len(),
                    "registered workflow"
                );
                slot.insert(Arc::new(definition));
                Ok(())
            }
        }
    }

    pub fn definition(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Summaries of every registered definition, sorted by name.
    pub fn list_workflow_definitions(&self) -> Vec<WorkflowSummary> {
        let mut summaries: Vec<WorkflowSummary> = self
            .definitions
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Run a workflow to a terminal state and return the execution.
    pub async fn run_workflow(
        &self,
        workflow_name: &str,
        params: Map<String, Value>,
    ) -> Result<WorkflowExecution, ExecutorError> {
        let (definition, execution, cancel) = self.prepare(workflow_name, params).await?;
        self.drive(&definition, execution, cancel).await
    }

    /// Look up an execution by ID.
    pub async fn get_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<WorkflowExecution, ExecutorError> {
        self.store
            .get(execution_id)
            .await?
            .ok_or(ExecutorError::ExecutionNotFound(*execution_id))
    }

    /// Executions matching `filter`, most recent first.
    pub async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<WorkflowExecution>, ExecutorError> {
        Ok(self.store.list(filter).await?)
    }

    /// Cancel an in-flight execution.
    ///
    /// The running attempt (or retry sleep) is interrupted and the execution
    /// ends `failed` with `execution cancelled`, whatever the step's
    /// `on_error`. This holds even when the last step has already produced
    /// its output. Unknown and already-terminal executions are not found.
    pub fn cancel(&self, execution_id: &Uuid) -> Result<(), ExecutorError> {
        // Fired under the map guard so it cannot interleave with the run
        // unregistering its token.
        let entry = self
            .cancellation_tokens
            .get(execution_id)
            .ok_or(ExecutorError::ExecutionNotFound(*execution_id))?;

        tracing::info!(execution_id = %execution_id, "cancelling execution");
        entry.value().cancel();
        Ok(())
    }

    /// Create and store a fresh `running` execution.
    async fn prepare(
        &self,
        workflow_name: &str,
        params: Map<String, Value>,
    ) -> Result<(Arc<WorkflowDefinition>, WorkflowExecution, CancellationToken), ExecutorError> {
        let definition = self
            .definition(workflow_name)
            .ok_or_else(|| ExecutorError::WorkflowNotFound(workflow_name.to_string()))?;

        let execution = WorkflowExecution::new(&definition.name, definition.steps.len(), params);
        self.store.put(&execution).await?;

        let cancel = CancellationToken::new();
        self.cancellation_tokens
            .insert(execution.execution_id, cancel.clone());

        tracing::info!(
            execution_id = %execution.execution_id,
            workflow = definition.name.as_str(),
            steps = definition.steps.len(),
            "starting workflow execution"
        );

        Ok((definition, execution, cancel))
    }

    /// Run the steps of a prepared execution to a terminal state.
    async fn drive(
        &self,
        definition: &WorkflowDefinition,
        mut execution: WorkflowExecution,
        cancel: CancellationToken,
    ) -> Result<WorkflowExecution, ExecutorError> {
        let execution_id = execution.execution_id;
        let run_start = Instant::now();

        let outcome = self.execute_steps(definition, &mut execution, &cancel).await;
        self.cancellation_tokens.remove(&execution_id);
        outcome?;

        tracing::info!(
            execution_id = %execution_id,
            workflow = definition.name.as_str(),
            status = %execution.status,
            duration_ms = run_start.elapsed().as_millis() as u64,
            "workflow execution finished"
        );

        Ok(execution)
    }

    async fn execute_steps(
        &self,
        definition: &WorkflowDefinition,
        execution: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        let execution_id = execution.execution_id;
        let mut ctx = ContextStore::from_params(&execution.params);

        for (index, step) in definition.steps.iter().enumerate() {
            execution.current_step = index + 1;

            let runner = &self.runner;
            let step_ctx = &ctx;
            let started = Instant::now();
            let (outcome, attempts) =
                RetryHandler::run(step.retry.as_ref(), cancel, move |attempt| {
                    tracing::debug!(
                        execution_id = %execution_id,
                        step = step.name.as_str(),
                        attempt,
                        "running step attempt"
                    );
                    runner.run(step, step_ctx, cancel)
                })
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    ctx.set(&step.output, output.clone());
                    execution.context = ctx.as_map().clone();
                    execution.record_step(StepResult::success(
                        &step.name,
                        output,
                        duration_ms,
                        attempts,
                    ))?;
                    tracing::debug!(
                        execution_id = %execution_id,
                        step = step.name.as_str(),
                        output_key = step.output.as_str(),
                        duration_ms,
                        "step succeeded"
                    );
                }
                Err(error) => {
                    let message = error.to_string();
                    execution.record_step(StepResult::failure(
                        &step.name,
                        message.clone(),
                        duration_ms,
                        attempts,
                    ))?;

                    if error.is_cancelled() || !step.on_error.proceeds() {
                        tracing::warn!(
                            execution_id = %execution_id,
                            step = step.name.as_str(),
                            attempts,
                            error = message.as_str(),
                            "step failed, aborting workflow"
                        );
                        execution.fail(message)?;
                        self.store.put(execution).await?;
                        return Ok(());
                    }

                    tracing::warn!(
                        execution_id = %execution_id,
                        step = step.name.as_str(),
                        attempts,
                        on_error = %step.on_error,
                        error = message.as_str(),
                        "step failed, continuing"
                    );
                }
            }

            self.store.put(execution).await?;
        }

        // After this no cancel can be accepted, so a request that got in
        // first is honoured below.
        self.cancellation_tokens.remove(&execution_id);
        if cancel.is_cancelled() {
            tracing::warn!(
                execution_id = %execution_id,
                "cancelled after the last step, discarding result"
            );
            execution.context = ctx.into_map();
            execution.fail(StepError::Cancelled.to_string())?;
            self.store.put(execution).await?;
            return Ok(());
        }

        let result: Map<String, Value> = definition
            .returns
            .iter()
            .map(|(key, value)| (key.clone(), resolve(value, &ctx)))
            .collect();
        execution.context = ctx.into_map();
        execution.complete(result)?;
        self.store.put(execution).await?;
        Ok(())
    }
}

impl<S: ExecutionStore + 'static> WorkflowEngine<S> {
    /// Start a workflow in the background and return its `running` snapshot.
    ///
    /// Progress is observable through `get_execution`; the run can be
    /// stopped with `cancel`.
    pub async fn start_workflow(
        self: &Arc<Self>,
        workflow_name: &str,
        params: Map<String, Value>,
    ) -> Result<WorkflowExecution, ExecutorError> {
        let (definition, execution, cancel) = self.prepare(workflow_name, params).await?;
        let snapshot = execution.clone();

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let execution_id = execution.execution_id;
            if let Err(error) = engine.drive(&definition, execution, cancel).await {
                tracing::error!(execution_id = %execution_id, %error, "background execution failed");
            }
        });

        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
