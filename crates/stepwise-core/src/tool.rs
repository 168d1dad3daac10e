//! The tool-invocation contract.
//!
//! The engine's only outbound dependency: invoke a named tool on a named
//! service with a parameter tree and get back a value tree or a failure
//! message. Whether the call crosses a network, hits a local process or is
//! a pure computation is the implementor's business. Transport-level
//! timeouts, authentication and HTTP retries live below this boundary.
//!
//! Implementations live in `stepwise-infra` (dependency inversion, same as
//! the execution store).

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`ToolInvoker::invoke`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// A fully resolved tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub service: String,
    pub tool: String,
    pub params: Value,
}

impl ToolCall {
    pub fn new(service: impl Into<String>, tool: impl Into<String>, params: Value) -> Self {
        Self {
            service: service.into(),
            tool: tool.into(),
            params,
        }
    }
}

/// A failed tool call. The message is surfaced to callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Invokes tools on external services.
///
/// Object-safe so the engine can hold an `Arc<dyn ToolInvoker>`. The
/// cancellation token fires when the owning execution is cancelled;
/// implementations should stop waiting on the remote side when it does.
pub trait ToolInvoker: Send + Sync {
    fn invoke(&self, call: ToolCall, cancel: CancellationToken) -> ToolFuture<'_>;
}
