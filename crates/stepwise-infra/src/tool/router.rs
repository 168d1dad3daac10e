//! Routing tool invoker.
//!
//! `ToolRouter` is the invoker the binary hands to the engine: services
//! registered in the local toolbox are served in-process, everything else
//! goes to the HTTP client when the service is configured there.

use stepwise_core::tool::{ToolCall, ToolError, ToolFuture, ToolInvoker};
use tokio_util::sync::CancellationToken;

use super::http::HttpToolInvoker;
use super::local::LocalToolbox;

pub struct ToolRouter {
    local: LocalToolbox,
    http: Option<HttpToolInvoker>,
}

impl ToolRouter {
    pub fn new(local: LocalToolbox, http: Option<HttpToolInvoker>) -> Self {
        Self { local, http }
    }

    /// Every reachable service name, sorted and deduplicated.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .local
            .tool_names()
            .into_iter()
            .filter_map(|name| name.split_once('.').map(|(service, _)| service.to_string()))
            .chain(self.http.iter().flat_map(HttpToolInvoker::service_names))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl ToolInvoker for ToolRouter {
    fn invoke(&self, call: ToolCall, cancel: CancellationToken) -> ToolFuture<'_> {
        if self.local.has_service(&call.service) {
            return self.local.invoke(call, cancel);
        }
        match &self.http {
            Some(http) if http.has_service(&call.service) => http.invoke(call, cancel),
            _ => Box::pin(async move {
                Err(ToolError::new(format!(
                    "unknown tool service '{}'",
                    call.service
                )))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use stepwise_types::config::ServiceEndpoint;

    fn router() -> ToolRouter {
        let mut services = HashMap::new();
        services.insert(
            "search".to_string(),
            ServiceEndpoint {
                // Nothing listens on port 9 (discard); only routing is tested here.
                base_url: "http://127.0.0.1:9".to_string(),
                timeout_secs: Some(1),
            },
        );
        ToolRouter::new(
            LocalToolbox::with_builtins(),
            Some(HttpToolInvoker::new(services).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_local_service_is_preferred() {
        let out = router()
            .invoke(
                ToolCall::new("core", "echo", json!({ "x": 1 })),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!({ "x": 1 }));
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let err = router()
            .invoke(ToolCall::new("billing", "charge", json!({})), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown tool service 'billing'");
    }

    #[tokio::test]
    async fn test_http_service_is_routed() {
        let err = router()
            .invoke(ToolCall::new("search", "jobs", json!({})), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("search.jobs"), "got: {err}");
    }

    #[test]
    fn test_service_names() {
        assert_eq!(router().service_names(), vec!["core", "search"]);
    }
}
