//! Step dispatcher for the three workflow step modes.
//!
//! `StepRunner` performs exactly one attempt of one step: it selects the
//! mode from the populated fields, resolves inputs against the context, and
//! returns the output value. Every attempt runs under the step's deadline
//! and the execution's cancellation token. Retries and `on_error` are the
//! caller's concern (see `retry` and `executor`).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use stepwise_types::workflow::{StepMode, WorkflowStep};
use tokio_util::sync::CancellationToken;

use super::context::ContextStore;
use super::expression::{ExpressionError, WorkflowEvaluator};
use super::resolve::{render_template, resolve};
use crate::tool::{ToolCall, ToolInvoker};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default step timeout in seconds.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors that can occur during one step attempt.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The tool service reported a failure. The message is kept verbatim.
    #[error("{0}")]
    ToolFailed(String),

    /// Expression validation or evaluation failed.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// The step does not declare exactly one mode.
    #[error("invalid step: {0}")]
    InvalidStep(String),

    /// The attempt exceeded its deadline.
    #[error("step timed out after {0:?}")]
    Timeout(Duration),

    /// The owning execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,
}

impl StepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Executes individual workflow steps by dispatching on their mode.
pub struct StepRunner {
    invoker: Arc<dyn ToolInvoker>,
    evaluator: WorkflowEvaluator,
    default_timeout: Duration,
}

impl StepRunner {
    /// Create a runner that sends remote-tool steps to `invoker`.
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            evaluator: WorkflowEvaluator::new(),
            default_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
        }
    }

    /// Override the deadline used for steps without `timeout_secs`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Deadline applied to each attempt of `step`.
    pub fn timeout_for(&self, step: &WorkflowStep) -> Duration {
        step.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    /// Run one attempt of a step and return its output.
    pub async fn run(
        &self,
        step: &WorkflowStep,
        ctx: &ContextStore,
        cancel: &CancellationToken,
    ) -> Result<Value, StepError> {
        let mode = step.mode().ok_or_else(|| {
            StepError::InvalidStep(format!(
                "step '{}' must declare exactly one of service+tool, expression or template",
                step.name
            ))
        })?;
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let deadline = self.timeout_for(step);
        tracing::debug!(step = %step.name, mode = mode.kind(), "dispatching step");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StepError::Cancelled),
            outcome = tokio::time::timeout(deadline, self.dispatch(mode, ctx, cancel)) => {
                outcome.unwrap_or(Err(StepError::Timeout(deadline)))
            }
        }
    }

    async fn dispatch(
        &self,
        mode: StepMode<'_>,
        ctx: &ContextStore,
        cancel: &CancellationToken,
    ) -> Result<Value, StepError> {
        match mode {
            StepMode::RemoteTool {
                service,
                tool,
                params,
            } => {
                let params = params
                    .map(|p| resolve(p, ctx))
                    .unwrap_or_else(|| Value::Object(Map::new()));
                let call = ToolCall::new(service, tool, params);
                self.invoker
                    .invoke(call, cancel.clone())
                    .await
                    .map_err(|e| StepError::ToolFailed(e.message))
            }
            StepMode::Expression(expr) => Ok(self.evaluator.evaluate_in_context(expr, ctx)?),
            StepMode::Template(template) => Ok(Value::String(render_template(template, ctx))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HangingInvoker, ScriptedInvoker};
    use serde_json::json;

    fn tool_step(tool: &str, params: Value) -> WorkflowStep {
        WorkflowStep {
            name: tool.to_string(),
            service: Some("crm".to_string()),
            tool: Some(tool.to_string()),
            params: Some(params),
            output: "out".to_string(),
            ..Default::default()
        }
    }

    fn ctx(value: Value) -> ContextStore {
        ContextStore::from_params(value.as_object().unwrap())
    }

    #[tokio::test]
    async fn test_tool_step_resolves_params_and_returns_output_verbatim() {
        let invoker = Arc::new(ScriptedInvoker::new().ok("lookup", json!({ "id": 42, "tags": [] })));
        let runner = StepRunner::new(invoker.clone());
        let step = tool_step("lookup", json!({ "email": "${lead.email}", "limit": 5 }));
        let ctx = ctx(json!({ "lead": { "email": "ana@example.com" } }));

        let out = runner
            .run(&step, &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, json!({ "id": 42, "tags": [] }));

        let calls = invoker.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].service, "crm");
        assert_eq!(calls[0].params, json!({ "email": "ana@example.com", "limit": 5 }));
    }

    #[tokio::test]
    async fn test_tool_step_without_params_sends_empty_object() {
        let invoker = Arc::new(ScriptedInvoker::new().ok("ping", json!("pong")));
        let runner = StepRunner::new(invoker.clone());
        let mut step = tool_step("ping", json!(null));
        step.params = None;

        runner
            .run(&step, &ContextStore::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(invoker.calls()[0].params, json!({}));
    }

    #[tokio::test]
    async fn test_tool_failure_message_is_verbatim() {
        let invoker = Arc::new(ScriptedInvoker::new().fail("lookup", "CRM returned 503"));
        let runner = StepRunner::new(invoker);
        let err = runner
            .run(
                &tool_step("lookup", json!({})),
                &ContextStore::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "CRM returned 503");
    }

    #[tokio::test]
    async fn test_expression_step_sees_context_keys() {
        let runner = StepRunner::new(Arc::new(ScriptedInvoker::new()));
        let step = WorkflowStep {
            name: "count".to_string(),
            expression: Some("candidates|length".to_string()),
            output: "total".to_string(),
            ..Default::default()
        };
        let ctx = ctx(json!({ "candidates": ["a", "b"] }));
        let out = runner
            .run(&step, &ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, json!(2.0));
    }

    #[tokio::test]
    async fn test_expression_failure_is_step_error() {
        let runner = StepRunner::new(Arc::new(ScriptedInvoker::new()));
        let step = WorkflowStep {
            name: "bad".to_string(),
            expression: Some("path|readFile".to_string()),
            output: "x".to_string(),
            ..Default::default()
        };
        let err = runner
            .run(&step, &ContextStore::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Expression(_)));
    }

    #[tokio::test]
    async fn test_template_step_always_returns_string() {
        let runner = StepRunner::new(Arc::new(ScriptedInvoker::new()));
        let step = WorkflowStep {
            name: "render".to_string(),
            template: Some("${count}".to_string()),
            output: "text".to_string(),
            ..Default::default()
        };
        let out = runner
            .run(&step, &ctx(json!({ "count": 3 })), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, json!("3"));
    }

    #[tokio::test]
    async fn test_step_without_mode_is_invalid() {
        let runner = StepRunner::new(Arc::new(ScriptedInvoker::new()));
        let step = WorkflowStep {
            name: "empty".to_string(),
            output: "x".to_string(),
            ..Default::default()
        };
        let err = runner
            .run(&step, &ContextStore::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidStep(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_tool_call_times_out() {
        let runner = StepRunner::new(Arc::new(HangingInvoker));
        let mut step = tool_step("slow", json!({}));
        step.timeout_secs = Some(2);

        let err = runner
            .run(&step, &ContextStore::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Timeout(d) if d == Duration::from_secs(2)));
        assert_eq!(err.to_string(), "step timed out after 2s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_applies() {
        let runner = StepRunner::new(Arc::new(HangingInvoker))
            .with_default_timeout(Duration::from_secs(7));
        let step = tool_step("slow", json!({}));
        assert_eq!(runner.timeout_for(&step), Duration::from_secs(7));

        let err = runner
            .run(&step, &ContextStore::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Timeout(d) if d == Duration::from_secs(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_timeout_reports_millis() {
        let runner = StepRunner::new(Arc::new(HangingInvoker))
            .with_default_timeout(Duration::from_millis(250));
        let step = tool_step("slow", json!({}));

        let err = runner
            .run(&step, &ContextStore::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "step timed out after 250ms");
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_attempt() {
        let runner = StepRunner::new(Arc::new(HangingInvoker));
        let step = tool_step("slow", json!({}));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = runner
            .run(&step, &ContextStore::new(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_token_skips_dispatch() {
        let invoker = Arc::new(ScriptedInvoker::new().ok("lookup", json!(1)));
        let runner = StepRunner::new(invoker.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner
            .run(&tool_step("lookup", json!({})), &ContextStore::new(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(invoker.calls().is_empty());
    }
}
