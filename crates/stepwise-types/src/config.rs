//! Engine configuration types for stepwise.
//!
//! `EngineConfig` represents the top-level `config.toml` that controls
//! execution retention, step deadlines, the REST listener and the
//! endpoints of remote tool services.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the engine and its binary.
///
/// Loaded from `~/.stepwise/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory scanned for workflow definition files.
    /// Defaults to `<data_dir>/workflows` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows_dir: Option<PathBuf>,

    /// Maximum number of executions kept in the registry.
    #[serde(default = "default_max_retained_executions")]
    pub max_retained_executions: usize,

    /// Deadline applied to a step attempt that does not set `timeout_secs`.
    #[serde(default = "default_step_timeout_secs")]
    pub default_step_timeout_secs: u64,

    /// REST listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote tool services keyed by service identifier.
    #[serde(default)]
    pub services: HashMap<String, ServiceEndpoint>,
}

fn default_max_retained_executions() -> usize {
    1000
}

fn default_step_timeout_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflows_dir: None,
            max_retained_executions: default_max_retained_executions(),
            default_step_timeout_secs: default_step_timeout_secs(),
            server: ServerConfig::default(),
            services: HashMap::new(),
        }
    }
}

/// Where `stepwise serve` listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3790
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// A tool service reachable over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Base URL; tools are invoked at `{base_url}/tools/{tool}`.
    pub base_url: String,
    /// Client-side request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retained_executions, 1000);
        assert_eq!(config.default_step_timeout_secs, 300);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3790);
        assert!(config.services.is_empty());
        assert!(config.workflows_dir.is_none());
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_retained_executions, 1000);
        assert_eq!(config.server.port, 3790);
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
workflows_dir = "/srv/stepwise/workflows"
max_retained_executions = 50
default_step_timeout_secs = 30

[server]
port = 8080

[services.crm]
base_url = "http://localhost:9001"
timeout_secs = 10

[services.search]
base_url = "http://localhost:9002"
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.workflows_dir,
            Some(PathBuf::from("/srv/stepwise/workflows"))
        );
        assert_eq!(config.max_retained_executions, 50);
        assert_eq!(config.default_step_timeout_secs, 30);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services["crm"].timeout_secs, Some(10));
        assert_eq!(config.services["search"].timeout_secs, None);
    }
}
