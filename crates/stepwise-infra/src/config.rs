//! Engine configuration loader for stepwise.
//!
//! Reads `config.toml` (from `--config`, else the data directory, which is
//! `~/.stepwise/` in production) and deserializes it into [`EngineConfig`].
//! A missing file means defaults. A file that cannot be read or parsed, or
//! that sets a zero retention cap or step timeout, is an error.

use std::path::{Path, PathBuf};

use stepwise_types::config::EngineConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "STEPWISE_DATA_DIR";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value in {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `STEPWISE_DATA_DIR` environment variable
/// 2. `~/.stepwise`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".stepwise");
    }

    PathBuf::from(".stepwise")
}

/// The config file to load: the explicit path if given, else
/// `{data_dir}/config.toml`.
pub fn config_path(explicit: Option<&Path>, data_dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE))
}

/// Load engine configuration from `path`.
///
/// A missing file yields [`EngineConfig::default()`].
pub async fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(EngineConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config = toml::from_str::<EngineConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_config(&config).map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })?;

    tracing::debug!(
        path = %path.display(),
        services = config.services.len(),
        "loaded engine config"
    );
    Ok(config)
}

fn validate_config(config: &EngineConfig) -> Result<(), String> {
    if config.max_retained_executions == 0 {
        return Err("max_retained_executions must be >= 1".to_string());
    }
    if config.default_step_timeout_secs == 0 {
        return Err("default_step_timeout_secs must be > 0".to_string());
    }
    Ok(())
}

/// Directory scanned for workflow definitions: `workflows_dir` from the
/// config, else `{data_dir}/workflows`.
pub fn workflows_dir(config: &EngineConfig, data_dir: &Path) -> PathBuf {
    config
        .workflows_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("workflows"))
}
