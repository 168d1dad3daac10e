//! In-process tool services.
//!
//! `LocalToolbox` maps `(service, tool)` pairs to async handlers that run
//! inside the engine's process. It ships a small `core` service used for
//! smoke-testing workflows without any external collaborator:
//!
//! | tool | behavior |
//! |---|---|
//! | `core.echo` | returns its params unchanged |
//! | `core.fail` | fails with `params.message` |
//! | `core.sleep` | waits `params.ms` milliseconds, then returns `{ "slept_ms": ms }` |

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{json, Value};
use stepwise_core::tool::{ToolCall, ToolError, ToolFuture, ToolInvoker};
use tokio_util::sync::CancellationToken;

/// Name of the built-in service.
pub const CORE_SERVICE: &str = "core";

type Handler =
    Arc<dyn Fn(Value, CancellationToken) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Registry of in-process tool handlers.
#[derive(Clone, Default)]
pub struct LocalToolbox {
    handlers: HashMap<(String, String), Handler>,
}

impl LocalToolbox {
    /// An empty toolbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// A toolbox with the `core` service registered.
    pub fn with_builtins() -> Self {
        let mut toolbox = Self::new();

        toolbox.register(CORE_SERVICE, "echo", |params, _cancel| async move { Ok(params) });

        toolbox.register(CORE_SERVICE, "fail", |params, _cancel| async move {
            let message = params
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("core.fail invoked");
            Err(ToolError::new(message))
        });

        toolbox.register(CORE_SERVICE, "sleep", |params, cancel| async move {
            let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::select! {
                _ = cancel.cancelled() => Err(ToolError::new("core.sleep cancelled")),
                _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(json!({ "slept_ms": ms })),
            }
        });

        toolbox
    }

    /// Register (or replace) the handler for `service.tool`.
    pub fn register<F, Fut>(&mut self, service: &str, tool: &str, handler: F)
    where
        F: Fn(Value, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params, cancel| handler(params, cancel).boxed());
        self.handlers
            .insert((service.to_string(), tool.to_string()), handler);
    }

    /// Whether any tool is registered under `service`.
    pub fn has_service(&self, service: &str) -> bool {
        self.handlers.keys().any(|(s, _)| s == service)
    }

    pub fn contains(&self, service: &str, tool: &str) -> bool {
        self.handlers
            .contains_key(&(service.to_string(), tool.to_string()))
    }

    /// Registered `service.tool` names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .map(|(service, tool)| format!("{service}.{tool}"))
            .collect();
        names.sort();
        names
    }
}

impl ToolInvoker for LocalToolbox {
    fn invoke(&self, call: ToolCall, cancel: CancellationToken) -> ToolFuture<'_> {
        let handler = self
            .handlers
            .get(&(call.service.clone(), call.tool.clone()))
            .cloned();

        Box::pin(async move {
            let Some(handler) = handler else {
                return Err(ToolError::new(format!(
                    "unknown tool '{}.{}'",
                    call.service, call.tool
                )));
            };
            tracing::debug!(service = %call.service, tool = %call.tool, "invoking local tool");
            handler(call.params, cancel).await
        })
    }
}
