//! Configuration management for module reconfiguration
//!
//! Handles configuration loading (TOML or JSON) and validation. Every section
//! is optional and defaulted, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classloading::DEFAULT_WAIT_TIMEOUT;
use crate::module::ALL_UNNAMED;
use crate::reconfig::StrategyKind;
use crate::utils::{ensure_fmt, ensure_not_empty, with_fallback};

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "module_reconfig=debug"); RUST_LOG takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Strategy selection configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Privileged strategies never to select
    #[serde(default)]
    pub disabled: Vec<StrategyKind>,
}

/// Exclusive execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusiveConfig {
    /// Bound on waiting for a concurrent producer, in milliseconds
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

fn default_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT.as_millis() as u64
}

impl ExclusiveConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for ExclusiveConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

/// Manifest rendering configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Write the `Add-Opens` attribute into packaged manifests
    #[serde(default = "default_true")]
    pub render_add_opens: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            render_add_opens: true,
        }
    }
}

/// A module open declared directly in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredModuleOpen {
    /// Module whose packages are opened
    pub module: String,

    /// Module the packages are opened to
    #[serde(default = "default_opening_module")]
    pub to: String,

    pub packages: Vec<String>,
}

fn default_opening_module() -> String {
    ALL_UNNAMED.to_string()
}

/// A JVM option contributed by an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JvmOption {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// JVM options declared by one extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionJvmConfig {
    pub name: String,
    #[serde(default)]
    pub jvm_options: Vec<JvmOption>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconfigConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub strategies: StrategyConfig,

    #[serde(default)]
    pub exclusive: ExclusiveConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub module_opens: Vec<DeclaredModuleOpen>,

    #[serde(default)]
    pub extensions: Vec<ExtensionJvmConfig>,
}

impl ReconfigConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ReconfigConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ReconfigConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, choosing the format by file extension
    ///
    /// `.json` files are read as JSON, everything else as TOML.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration, falling back to defaults if the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        with_fallback(
            || {
                let config = Self::from_file(path).map_err(|e| format!("{:#}", e))?;
                info!("Loaded module reconfiguration config from {}", path.display());
                Ok::<_, String>(config)
            },
            Self::default,
            "Failed to load module reconfiguration config, using defaults",
        )
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure_fmt(self.exclusive.wait_timeout_ms > 0, || {
            "exclusive.wait_timeout_ms must be greater than 0".to_string()
        })
        .map_err(anyhow::Error::msg)?;

        for (i, declared) in self.module_opens.iter().enumerate() {
            ensure_not_empty(&declared.packages, &format!("module_opens[{}].packages", i))
                .map_err(anyhow::Error::msg)?;
        }
        for extension in &self.extensions {
            ensure_fmt(!extension.name.trim().is_empty(), || {
                "extension name must not be empty".to_string()
            })
            .map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }
}
