//! # Application Configuration
//!
//! [`AppConfig`] holds the settings the bootstrap itself consumes: the
//! namespace to wire, the teardown grace period, whether to listen for OS
//! signals and the optional embedded listener. It is read from a JSON, TOML
//! or YAML file, picked by extension.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::net::ListenerConfig;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Settings consumed by the bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Namespace whose component definitions are wired.
    pub namespace: String,
    /// Per-component bound on `stop` during teardown.
    pub shutdown_grace_ms: u64,
    /// Install SIGINT/SIGTERM handlers while running.
    pub handle_signals: bool,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: Option<String>,
    /// Embedded TCP listener; none when absent.
    pub listener: Option<ListenerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: constants::DEFAULT_NAMESPACE.to_string(),
            shutdown_grace_ms: constants::DEFAULT_SHUTDOWN_GRACE_MS,
            handle_signals: true,
            log_level: None,
            listener: None,
        }
    }
}

impl AppConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Load configuration from a file, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::config(Some(path.to_path_buf()), "unsupported configuration format")
        })?;
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::config(Some(path.to_path_buf()), e.to_string()))?;
        let config = Self::parse(&data, format)
            .map_err(|e| Error::config(Some(path.to_path_buf()), e.to_string()))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration text in the given format.
    pub fn parse(data: &str, format: ConfigFormat) -> Result<Self> {
        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| Error::config(None, format!("failed to deserialize from JSON: {}", e)))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| Error::config(None, format!("failed to deserialize from YAML: {}", e)))?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| Error::config(None, format!("failed to deserialize from TOML: {}", e)))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| Error::config(None, format!("failed to serialize to JSON: {}", e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| Error::config(None, format!("failed to serialize to YAML: {}", e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| Error::config(None, format!("failed to serialize to TOML: {}", e))),
        }
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        crate::kernel::catalog::validate_identifier(&self.namespace)
            .map_err(|e| Error::config(None, e.to_string()))?;
        if self.shutdown_grace_ms == 0 {
            return Err(Error::config(None, "shutdown_grace_ms must be greater than zero"));
        }
        if let Some(listener) = &self.listener {
            listener.socket_addr()?;
        }
        Ok(())
    }
}
