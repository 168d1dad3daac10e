//! Workflow definition parsing, validation, and filesystem discovery.
//!
//! Converts YAML or JSON documents into `WorkflowDefinition`, validates the
//! structural constraints every registered workflow must satisfy, and scans
//! a directory tree for definition files.

use std::path::{Path, PathBuf};

use stepwise_types::workflow::{StepMode, WorkflowDefinition, WorkflowStep};
use thiserror::Error;

use super::expression::validate_expression;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while loading or registering definitions.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A definition with the same name is already registered.
    #[error("workflow '{0}' is already registered")]
    DuplicateName(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML string into a validated `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Parse a JSON string into a validated `WorkflowDefinition`.
pub fn parse_workflow_json(json: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - Name is non-empty and contains only alphanumerics, `-` and `_`
/// - At least one step exists
/// - Every step has a name, an output key and exactly one execution mode
/// - Service and tool names are plain identifiers
/// - Expression steps pass the restricted-grammar check
/// - Retry `max_attempts >= 1` and `timeout_secs > 0` when set
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.name.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow name must not be empty".to_string(),
        ));
    }
    if !def
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(WorkflowError::ValidationError(format!(
            "workflow name '{}' contains invalid characters (only alphanumerics, '-' and '_' allowed)",
            def.name
        )));
    }

    if def.steps.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow must have at least one step".to_string(),
        ));
    }

    for (index, step) in def.steps.iter().enumerate() {
        validate_step(index + 1, step)?;
    }

    Ok(())
}

fn validate_step(position: usize, step: &WorkflowStep) -> Result<(), WorkflowError> {
    let label = if step.name.is_empty() {
        format!("step {position}")
    } else {
        format!("step {position} ('{}')", step.name)
    };
    let invalid = |msg: &str| WorkflowError::ValidationError(format!("{label}: {msg}"));

    if step.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if step.output.trim().is_empty() {
        return Err(invalid("output key must not be empty"));
    }

    match step.mode() {
        Some(StepMode::RemoteTool { service, tool, .. }) => {
            if service.trim().is_empty() || tool.trim().is_empty() {
                return Err(invalid("service and tool must not be empty"));
            }
            if !is_identifier(service) || !is_identifier(tool) {
                return Err(invalid(
                    "service and tool may only contain alphanumerics, '-', '_' and '.'",
                ));
            }
        }
        Some(StepMode::Expression(expr)) => {
            validate_expression(expr).map_err(|e| invalid(&e.to_string()))?;
        }
        Some(StepMode::Template(_)) => {}
        None => {
            return Err(invalid(
                "must declare exactly one of service+tool, expression or template",
            ));
        }
    }

    if let Some(retry) = &step.retry {
        if retry.max_attempts < 1 {
            return Err(invalid("retry max_attempts must be >= 1"));
        }
    }

    if step.timeout_secs == Some(0) {
        return Err(invalid("timeout must be > 0"));
    }

    Ok(())
}

/// Service and tool names must form a single plain URL path segment.
fn is_identifier(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.chars().all(|c| c == '.')
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load a workflow definition from a `.yaml`, `.yml` or `.json` file.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_workflow_json(&content),
        _ => parse_workflow_yaml(&content),
    }
}

/// Discover all workflow files under `base_dir`, sorted by path.
///
/// Files that fail to parse or validate are skipped with a warning.
pub fn discover_workflows(
    base_dir: &Path,
) -> Result<Vec<(PathBuf, WorkflowDefinition)>, WorkflowError> {
    let mut results = Vec::new();
    if !base_dir.exists() {
        return Ok(results);
    }
    discover_recursive(base_dir, &mut results)?;
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn discover_recursive(
    dir: &Path,
    results: &mut Vec<(PathBuf, WorkflowDefinition)>,
) -> Result<(), WorkflowError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            discover_recursive(&path, results)?;
            continue;
        }
        let is_definition = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| matches!(ext, "yaml" | "yml" | "json"));
        if !is_definition {
            continue;
        }
        match load_workflow_file(&path) {
            Ok(def) => results.push((path, def)),
            Err(error) => {
                tracing::warn!(?path, %error, "skipping unparseable workflow file");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
