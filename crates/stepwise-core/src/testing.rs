//! Scripted tool invokers shared by the engine's unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tool::{ToolCall, ToolError, ToolFuture, ToolInvoker};

/// Replays queued responses per tool name and records every call.
///
/// The last queued response for a tool is sticky: once the queue is down to
/// one entry it is returned for every further call.
#[derive(Default)]
pub(crate) struct ScriptedInvoker {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, String>>>>,
    calls: Mutex<Vec<ToolCall>>,
}

impl ScriptedInvoker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ok(self, tool: &str, value: Value) -> Self {
        self.push(tool, Ok(value))
    }

    pub(crate) fn fail(self, tool: &str, message: &str) -> Self {
        self.push(tool, Err(message.to_string()))
    }

    fn push(self, tool: &str, response: Result<Value, String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(tool.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, tool: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tool == tool)
            .count()
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn invoke(&self, call: ToolCall, _cancel: CancellationToken) -> ToolFuture<'_> {
        let response = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(&call.tool) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        let tool = call.tool.clone();
        self.calls.lock().unwrap().push(call);

        Box::pin(async move {
            match response {
                Some(Ok(value)) => Ok(value),
                Some(Err(message)) => Err(ToolError::new(message)),
                None => Err(ToolError::new(format!("no scripted response for '{tool}'"))),
            }
        })
    }
}

/// Never answers. Used to exercise deadlines and cancellation.
pub(crate) struct HangingInvoker;

impl ToolInvoker for HangingInvoker {
    fn invoke(&self, _call: ToolCall, _cancel: CancellationToken) -> ToolFuture<'_> {
        Box::pin(std::future::pending())
    }
}
