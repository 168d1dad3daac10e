//! CLI workflow subcommands: run, list, validate.

use std::path::Path;

use anyhow::{bail, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde_json::{Map, Value};

use stepwise_core::workflow::definition::{load_workflow_file, WorkflowError};
use stepwise_types::workflow::{
    ExecutionFilter, ExecutionStatus, StepStatus, WorkflowExecution,
};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run `name` to a terminal state and print the execution.
///
/// Returns the terminal status so the caller can pick the exit code.
pub async fn handle_run(
    state: &AppState,
    name: &str,
    params: Option<&str>,
    params_file: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<ExecutionStatus> {
    let params = read_params(params, params_file).await?;
    let execution = state.engine.run_workflow(name, params).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else if !quiet {
        print_execution(&execution)?;
    } else if let Some(error) = &execution.error {
        eprintln!("{error}");
    }

    Ok(execution.status)
}

/// Parse the initial parameters from `--params` or `--params-file`.
///
/// Both absent means an empty parameter map; anything but a JSON object
/// (or `null`) is rejected.
pub async fn read_params(inline: Option<&str>, file: Option<&Path>) -> Result<Map<String, Value>> {
    let raw = match (inline, file) {
        (Some(raw), _) => raw.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read params file {}", path.display()))?,
        (None, None) => return Ok(Map::new()),
    };

    let value: Value = serde_json::from_str(&raw).context("Invalid JSON params")?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => bail!("Params must be a JSON object, got {}", json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn print_execution(execution: &WorkflowExecution) -> Result<()> {
    println!();
    println!(
        "  {} {} ({})",
        style("Workflow:").bold(),
        style(&execution.workflow_name).cyan(),
        execution.execution_id
    );
    println!("  Status: {}", format_status_text(execution.status));
    println!(
        "  Steps: {}/{}",
        execution.steps_completed.len(),
        execution.total_steps
    );
    println!();

    if !execution.steps_completed.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("#"),
                Cell::new("Step").fg(Color::Cyan),
                Cell::new("Status"),
                Cell::new("Attempts"),
                Cell::new("Duration"),
                Cell::new("Error"),
            ]);

        for (i, step) in execution.steps_completed.iter().enumerate() {
            let status_cell = match step.status {
                StepStatus::Success => Cell::new("success").fg(Color::Green),
                StepStatus::Failed => Cell::new("failed").fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&step.step_name),
                status_cell,
                Cell::new(step.attempts),
                Cell::new(format!("{}ms", step.duration_ms)),
                Cell::new(step.error.as_deref().unwrap_or("-")),
            ]);
        }

        println!("{table}");
        println!();
    }

    if let Some(result) = &execution.result {
        println!("  {}", style("Result:").bold());
        let pretty = serde_json::to_string_pretty(result)?;
        for line in pretty.lines() {
            println!("  {line}");
        }
        println!();
    }
    if let Some(error) = &execution.error {
        println!("  Error: {}", style(error).red());
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

pub fn handle_list_workflows(state: &AppState, json: bool) -> Result<()> {
    let summaries = state.engine.list_workflow_definitions();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!();
        println!("  No workflows registered.");
        println!(
            "  Add definitions to: {}",
            style(state.workflows_dir.display()).dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Steps"),
            Cell::new("Trigger"),
            Cell::new("Description"),
        ]);

    for summary in &summaries {
        table.add_row(vec![
            Cell::new(&summary.name),
            Cell::new(summary.step_count),
            Cell::new(summary.trigger.as_deref().unwrap_or("-")),
            Cell::new(summary.description.as_deref().unwrap_or("")),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

pub async fn handle_list_executions(
    state: &AppState,
    workflow: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let filter = ExecutionFilter {
        workflow_name: workflow,
        limit: Some(limit),
    };
    let executions = state.engine.list_executions(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&executions)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!();
        println!("  No executions recorded.");
        println!(
            "  Executions live in memory; query a running server with {}",
            style("GET /api/v1/executions").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Execution").fg(Color::Cyan),
            Cell::new("Workflow"),
            Cell::new("Status"),
            Cell::new("Steps"),
            Cell::new("Started"),
        ]);

    for execution in &executions {
        table.add_row(vec![
            Cell::new(execution.execution_id.to_string().chars().take(8).collect::<String>()),
            Cell::new(&execution.workflow_name),
            format_status(execution.status),
            Cell::new(format!(
                "{}/{}",
                execution.steps_completed.len(),
                execution.total_steps
            )),
            Cell::new(execution.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub fn handle_validate(file: &Path, json: bool) -> Result<()> {
    let definition = load_workflow_file(file).map_err(|e| match e {
        WorkflowError::ParseError(msg) => anyhow::anyhow!("Failed to parse {}: {msg}", file.display()),
        WorkflowError::ValidationError(msg) => {
            anyhow::anyhow!("Workflow validation failed: {msg}")
        }
        other => anyhow::anyhow!("Failed to load {}: {other}", file.display()),
    })?;

    if json {
        let out = serde_json::json!({
            "valid": true,
            "workflow": definition.summary(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} '{}' is valid ({} steps)",
            style("*").green().bold(),
            style(&definition.name).cyan(),
            definition.steps.len()
        );
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn format_status(status: ExecutionStatus) -> Cell {
    match status {
        ExecutionStatus::Running => Cell::new("running").fg(Color::Yellow),
        ExecutionStatus::Completed => Cell::new("completed").fg(Color::Green),
        ExecutionStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}

fn format_status_text(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Running => style("running").yellow().to_string(),
        ExecutionStatus::Completed => style("completed").green().to_string(),
        ExecutionStatus::Failed => style("failed").red().to_string(),
    }
}
