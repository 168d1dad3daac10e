//! Workflow domain types for stepwise.
//!
//! Defines the author-facing definition model (`WorkflowDefinition`,
//! `WorkflowStep`) and the execution tracking types (`WorkflowExecution`,
//! `StepResult`) that callers query after a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::TransitionError;

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// A declarative workflow: an ordered list of steps plus a return mapping.
///
/// Constructed once (usually loaded from YAML at startup) and read-only for
/// the rest of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique workflow name used for lookup and logging.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form trigger note (e.g. "cron: 0 8 * * 1"). Metadata only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Steps in execution order.
    pub steps: Vec<WorkflowStep>,
    /// Output field name -> value expression resolved against the final context.
    #[serde(rename = "return", default, skip_serializing_if = "Map::is_empty")]
    pub returns: Map<String, Value>,
}

impl WorkflowDefinition {
    /// Summary row for `list_workflow_definitions`.
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            trigger: self.trigger.clone(),
            step_count: self.steps.len(),
        }
    }
}

/// Listing view of a registered workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    pub step_count: usize,
}

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// One declared unit of work.
///
/// The execution mode is selected by which fields are populated:
/// ```yaml
/// - name: find candidates
///   service: crm
///   tool: search_candidates
///   params: { role: "${role}" }
///   output: candidates
/// - name: count
///   expression: "candidates|length"
///   output: total
/// - name: headline
///   template: "Found ${total} candidates for ${role}"
///   output: headline
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Human-readable label. Not required to be unique.
    pub name: String,
    /// Tool service to call (remote-tool mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Named operation on `service` (remote-tool mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Parameter tree, may contain `${path}` references (remote-tool mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Restricted expression evaluated against the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Text template with `${path}` references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Context key the step result is stored under.
    pub output: String,
    /// Failure policy once retries are exhausted.
    #[serde(default)]
    pub on_error: OnError,
    /// Optional bounded retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// Per-attempt deadline in seconds (engine default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// The execution mode of a step, borrowed from its definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepMode<'a> {
    RemoteTool {
        service: &'a str,
        tool: &'a str,
        params: Option<&'a Value>,
    },
    Expression(&'a str),
    Template(&'a str),
}

impl StepMode<'_> {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StepMode::RemoteTool { .. } => "tool",
            StepMode::Expression(_) => "expression",
            StepMode::Template(_) => "template",
        }
    }
}

impl WorkflowStep {
    /// Classify the populated fields into exactly one mode.
    ///
    /// Returns `None` when no mode or more than one mode is populated, or
    /// when only half of `service`/`tool` is set.
    pub fn mode(&self) -> Option<StepMode<'_>> {
        let tool_fields = self.service.is_some() || self.tool.is_some() || self.params.is_some();
        let selected = [tool_fields, self.expression.is_some(), self.template.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count();
        if selected != 1 {
            return None;
        }

        if tool_fields {
            match (self.service.as_deref(), self.tool.as_deref()) {
                (Some(service), Some(tool)) => Some(StepMode::RemoteTool {
                    service,
                    tool,
                    params: self.params.as_ref(),
                }),
                _ => None,
            }
        } else if let Some(expr) = self.expression.as_deref() {
            Some(StepMode::Expression(expr))
        } else {
            self.template.as_deref().map(StepMode::Template)
        }
    }
}

/// What to do once a step has failed for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Stop the workflow and mark the execution failed.
    #[default]
    Abort,
    /// Record the failure and move on without setting the output.
    Continue,
    /// Same behavior as `Continue`; used for optional outputs.
    Skip,
}

impl OnError {
    /// Whether a failure under this policy lets the workflow proceed.
    pub fn proceeds(self) -> bool {
        !matches!(self, OnError::Abort)
    }
}

impl std::fmt::Display for OnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OnError::Abort => "abort",
            OnError::Continue => "continue",
            OnError::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// Bounded retry with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds.
    #[serde(default)]
    pub delay: u64,
}

// ---------------------------------------------------------------------------
// Execution Status
// ---------------------------------------------------------------------------

/// Overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

// ---------------------------------------------------------------------------
// Step Result
// ---------------------------------------------------------------------------

/// Record of one attempted step. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Number of underlying attempts (1 + retries used).
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(step_name: &str, output: Value, duration_ms: u64, attempts: u32) -> Self {
        Self {
            step_name: step_name.to_string(),
            status: StepStatus::Success,
            duration_ms,
            timestamp: Utc::now(),
            attempts,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(step_name: &str, error: String, duration_ms: u64, attempts: u32) -> Self {
        Self {
            step_name: step_name.to_string(),
            status: StepStatus::Failed,
            duration_ms,
            timestamp: Utc::now(),
            attempts,
            output: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow Execution
// ---------------------------------------------------------------------------

/// One run of a workflow definition.
///
/// Status moves `running -> completed` or `running -> failed` exactly once;
/// the mutators below reject anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// UUIDv7 execution ID.
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    /// 1-based index of the step currently (or last) executing; 0 before the first.
    pub current_step: usize,
    pub total_steps: usize,
    pub steps_completed: Vec<StepResult>,
    /// Parameters as supplied by the caller.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Live context for this run.
    pub context: Map<String, Value>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    /// Create a fresh `running` execution. The context starts as a copy of `params`.
    pub fn new(workflow_name: &str, total_steps: usize, params: Map<String, Value>) -> Self {
        Self {
            execution_id: Uuid::now_v7(),
            workflow_name: workflow_name.to_string(),
            status: ExecutionStatus::Running,
            current_step: 0,
            total_steps,
            steps_completed: Vec::new(),
            context: params.clone(),
            params,
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Append a step result.
    pub fn record_step(&mut self, result: StepResult) -> Result<(), TransitionError> {
        self.ensure_running()?;
        if self.steps_completed.len() >= self.total_steps {
            return Err(TransitionError::TooManySteps {
                total: self.total_steps,
            });
        }
        self.steps_completed.push(result);
        Ok(())
    }

    /// Transition `running -> completed`.
    pub fn complete(&mut self, result: Map<String, Value>) -> Result<(), TransitionError> {
        self.ensure_running()?;
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        Ok(())
    }

    /// Transition `running -> failed`.
    pub fn fail(&mut self, error: String) -> Result<(), TransitionError> {
        self.ensure_running()?;
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_running(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                execution_id: self.execution_id,
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

/// Filter for `list_executions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ExecutionFilter {
    pub fn matches(&self, execution: &WorkflowExecution) -> bool {
        self.workflow_name
            .as_deref()
            .is_none_or(|name| execution.workflow_name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_yaml_with_all_modes() {
        let yaml = r#"
name: weekly-report
description: Collect placements and summarize
trigger: "cron: 0 8 * * 1"
steps:
  - name: fetch placements
    service: crm
    tool: list_placements
    params:
      since: "${since}"
    output: placements
    retry:
      max_attempts: 2
      delay: 500
  - name: count
    expression: "placements|length"
    output: total
    on_error: continue
  - name: headline
    template: "Placed ${total} candidates"
    output: headline
    on_error: skip
return:
  headline: "${headline}"
  total: "${total}"
"#;
        let def: WorkflowDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(def.name, "weekly-report");
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.returns.len(), 2);

        let first = &def.steps[0];
        assert_eq!(first.on_error, OnError::Abort);
        assert_eq!(
            first.retry,
            Some(RetryPolicy {
                max_attempts: 2,
                delay: 500
            })
        );
        assert!(matches!(
            first.mode(),
            Some(StepMode::RemoteTool {
                service: "crm",
                tool: "list_placements",
                ..
            })
        ));

        assert_eq!(def.steps[1].on_error, OnError::Continue);
        assert_eq!(
            def.steps[1].mode(),
            Some(StepMode::Expression("placements|length"))
        );
        assert_eq!(def.steps[2].on_error, OnError::Skip);
        assert_eq!(def.steps[2].mode().unwrap().kind(), "template");
    }

    #[test]
    fn test_return_mapping_keeps_declaration_order() {
        let yaml = r#"
name: ordered
steps:
  - name: a
    template: "x"
    output: a
return:
  zeta: "${a}"
  alpha: "${a}"
"#;
        let def: WorkflowDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        let keys: Vec<&String> = def.returns.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_mode_rejects_multiple_modes() {
        let step = WorkflowStep {
            name: "both".to_string(),
            template: Some("hi".to_string()),
            expression: Some("1 + 1".to_string()),
            output: "out".to_string(),
            ..Default::default()
        };
        assert_eq!(step.mode(), None);
    }

    #[test]
    fn test_mode_rejects_no_mode() {
        let step = WorkflowStep {
            name: "empty".to_string(),
            output: "out".to_string(),
            ..Default::default()
        };
        assert_eq!(step.mode(), None);
    }

    #[test]
    fn test_mode_rejects_tool_without_service() {
        let step = WorkflowStep {
            name: "half".to_string(),
            tool: Some("search".to_string()),
            output: "out".to_string(),
            ..Default::default()
        };
        assert_eq!(step.mode(), None);
    }

    #[test]
    fn test_on_error_proceeds() {
        assert!(!OnError::Abort.proceeds());
        assert!(OnError::Continue.proceeds());
        assert!(OnError::Skip.proceeds());
        assert_eq!(OnError::default(), OnError::Abort);
    }

    #[test]
    fn test_new_execution_copies_params_into_context() {
        let exec = WorkflowExecution::new("greet", 2, params(json!({ "name": "Ana" })));
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert_eq!(exec.context.get("name"), Some(&json!("Ana")));
        assert_eq!(exec.params.get("name"), Some(&json!("Ana")));
        assert!(exec.completed_at.is_none());
        assert!(exec.result.is_none());
        assert!(exec.error.is_none());
    }

    #[test]
    fn test_execution_ids_are_unique() {
        let a = WorkflowExecution::new("w", 1, Map::new());
        let b = WorkflowExecution::new("w", 1, Map::new());
        assert_ne!(a.execution_id, b.execution_id);
    }

    #[test]
    fn test_complete_sets_result_and_timestamp() {
        let mut exec = WorkflowExecution::new("w", 1, Map::new());
        exec.complete(params(json!({ "ok": true }))).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.completed_at.is_some());
        assert_eq!(exec.result.unwrap().get("ok"), Some(&json!(true)));
    }

    #[test]
    fn test_terminal_status_never_changes() {
        let mut exec = WorkflowExecution::new("w", 1, Map::new());
        exec.fail("boom".to_string()).unwrap();
        assert!(exec.complete(Map::new()).is_err());
        assert!(exec.fail("again".to_string()).is_err());
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error.as_deref(), Some("boom"));
        assert!(exec.result.is_none());
    }

    #[test]
    fn test_record_step_bounded_by_total_steps() {
        let mut exec = WorkflowExecution::new("w", 1, Map::new());
        exec.record_step(StepResult::success("a", json!(1), 3, 1))
            .unwrap();
        let err = exec
            .record_step(StepResult::success("b", json!(2), 3, 1))
            .unwrap_err();
        assert!(matches!(err, TransitionError::TooManySteps { total: 1 }));
        assert_eq!(exec.steps_completed.len(), 1);
    }

    #[test]
    fn test_execution_serializes_snake_case_status() {
        let exec = WorkflowExecution::new("w", 0, Map::new());
        let value = serde_json::to_value(&exec).unwrap();
        assert_eq!(value["status"], json!("running"));
        assert!(value.get("completed_at").is_none());
    }

    #[test]
    fn test_filter_matches_workflow_name() {
        let exec = WorkflowExecution::new("alpha", 0, Map::new());
        assert!(ExecutionFilter::default().matches(&exec));
        let filter = ExecutionFilter {
            workflow_name: Some("beta".to_string()),
            limit: None,
        };
        assert!(!filter.matches(&exec));
    }

    #[test]
    fn test_summary_counts_steps() {
        let def = WorkflowDefinition {
            name: "s".to_string(),
            description: Some("d".to_string()),
            trigger: None,
            steps: vec![WorkflowStep::default(), WorkflowStep::default()],
            returns: Map::new(),
        };
        let summary = def.summary();
        assert_eq!(summary.step_count, 2);
        assert_eq!(summary.description.as_deref(), Some("d"));
    }
}
