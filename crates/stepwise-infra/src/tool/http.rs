//! JSON-over-HTTP tool services.
//!
//! Each configured service has a base URL; invoking `tool` POSTs the
//! resolved params as the JSON body to `{base_url}/tools/{tool}` and
//! returns the JSON response body as the tool output.
//!
//! A non-2xx response fails the call with the body's `error` (string or
//! `{ message }`) or `message` field, falling back to the status line.

use std::collections::HashMap;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use stepwise_core::tool::{ToolCall, ToolError, ToolFuture, ToolInvoker};
use stepwise_types::config::ServiceEndpoint;
use tokio_util::sync::CancellationToken;

/// Connect timeout applied to every service.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for the tool services listed in `config.toml`.
pub struct HttpToolInvoker {
    client: reqwest::Client,
    services: HashMap<String, ServiceEndpoint>,
}

impl HttpToolInvoker {
    /// Build a client for the given services.
    pub fn new(services: HashMap<String, ServiceEndpoint>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, services })
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Configured service names, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    async fn call(&self, call: ToolCall) -> Result<Value, ToolError> {
        let endpoint = self.services.get(&call.service).ok_or_else(|| {
            ToolError::new(format!("unknown tool service '{}'", call.service))
        })?;
        let label = format!("{}.{}", call.service, call.tool);
        let url = tool_url(&endpoint.base_url, &call.tool);

        let mut request = self.client.post(&url).json(&call.params);
        if let Some(secs) = endpoint.timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }

        tracing::debug!(tool = %label, url = %url, "invoking HTTP tool");
        let response = request
            .send()
            .await
            .map_err(|e| ToolError::new(format!("{label} request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::new(format!("{label} response could not be read: {e}")))?;
        let body = serde_json::from_str::<Value>(&text).ok();

        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| format!("{label} returned {status}"));
            return Err(ToolError::new(message));
        }

        body.ok_or_else(|| ToolError::new(format!("{label} returned a non-JSON body")))
    }
}

impl ToolInvoker for HttpToolInvoker {
    fn invoke(&self, call: ToolCall, cancel: CancellationToken) -> ToolFuture<'_> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ToolError::new("tool call cancelled")),
                result = self.call(call) => result,
            }
        })
    }
}

/// Characters left as-is in the tool path segment (RFC 3986 unreserved).
const TOOL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn tool_url(base_url: &str, tool: &str) -> String {
    format!(
        "{}/tools/{}",
        base_url.trim_end_matches('/'),
        utf8_percent_encode(tool, TOOL_SEGMENT)
    )
}

fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error");
    error
        .and_then(Value::as_str)
        .or_else(|| error.and_then(|e| e.get("message")).and_then(Value::as_str))
        .or_else(|| body.get("message").and_then(Value::as_str))
        .map(String::from)
}
