//! Application state wiring the engine together.
//!
//! AppState holds the concrete engine used by both the CLI and the REST
//! API. The engine is generic over its execution store; AppState pins it to
//! the in-memory registry and hands it the routing tool invoker from infra.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use stepwise_core::workflow::definition::discover_workflows;
use stepwise_core::workflow::executor::WorkflowEngine;
use stepwise_core::workflow::registry::ExecutionRegistry;
use stepwise_infra::config::{config_path, load_config, resolve_data_dir, workflows_dir};
use stepwise_infra::tool::{HttpToolInvoker, LocalToolbox, ToolRouter};
use stepwise_types::config::EngineConfig;

/// The engine pinned to the in-memory execution registry.
pub type ConcreteEngine = WorkflowEngine<ExecutionRegistry>;

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConcreteEngine>,
    pub config: Arc<EngineConfig>,
    pub workflows_dir: PathBuf,
}

impl AppState {
    /// Load configuration, build the engine and register every workflow
    /// found in the workflows directory.
    pub async fn init(config_override: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let path = config_path(config_override, &data_dir);
        let config = load_config(&path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        let state = Self::from_config(config, &data_dir)?;
        state.load_workflows()?;
        Ok(state)
    }

    /// Build the engine for `config` without touching the workflows directory.
    pub fn from_config(config: EngineConfig, data_dir: &Path) -> anyhow::Result<Self> {
        let http = if config.services.is_empty() {
            None
        } else {
            Some(
                HttpToolInvoker::new(config.services.clone())
                    .context("Failed to build HTTP client for tool services")?,
            )
        };
        let router = ToolRouter::new(LocalToolbox::with_builtins(), http);
        tracing::debug!(services = ?router.service_names(), "tool services available");

        let engine = WorkflowEngine::new(
            ExecutionRegistry::new(config.max_retained_executions),
            Arc::new(router),
        )
        .with_default_step_timeout(Duration::from_secs(config.default_step_timeout_secs));

        Ok(Self {
            engine: Arc::new(engine),
            workflows_dir: workflows_dir(&config, data_dir),
            config: Arc::new(config),
        })
    }

    /// Register every definition under the workflows directory.
    ///
    /// Invalid or duplicate definitions are skipped with a warning so one bad
    /// file does not take the rest down. Returns how many were registered.
    pub fn load_workflows(&self) -> anyhow::Result<usize> {
        let discovered = discover_workflows(&self.workflows_dir).with_context(|| {
            format!(
                "Failed to scan workflows directory {}",
                self.workflows_dir.display()
            )
        })?;

        let mut registered = 0;
        for (path, definition) in discovered {
            match self.engine.register(definition) {
                Ok(()) => registered += 1,
                Err(error) => {
                    tracing::warn!(?path, %error, "skipping workflow definition");
                }
            }
        }

        tracing::info!(
            dir = %self.workflows_dir.display(),
            registered,
            "loaded workflow definitions"
        );
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GREETING: &str = r#"
name: greeting
steps:
  - name: hello
    template: "Hello, ${who}!"
    output: message
return:
  message: "${message}"
"#;

    #[test]
    fn test_load_workflows_skips_invalid_and_duplicates() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("workflows");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("a.yaml"), GREETING).unwrap();
        std::fs::write(dir.join("nested/b.yaml"), GREETING).unwrap();
        std::fs::write(dir.join("bad.yaml"), "name: bad\nsteps: []\n").unwrap();

        let state = AppState::from_config(EngineConfig::default(), tmp.path()).unwrap();
        assert_eq!(state.workflows_dir, dir);
        assert_eq!(state.load_workflows().unwrap(), 1);

        let names: Vec<String> = state
            .engine
            .list_workflow_definitions()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["greeting"]);
    }

    #[test]
    fn test_missing_workflows_dir_registers_nothing() {
        let tmp = TempDir::new().unwrap();
        let state = AppState::from_config(EngineConfig::default(), tmp.path()).unwrap();
        assert_eq!(state.load_workflows().unwrap(), 0);
    }
}
