//! Configuration loading and resolution
//!
//! Configuration is a single TOML file. Every key has a built-in default, so
//! a missing file (or a missing section) is never fatal: the client starts
//! with defaults and logs a warning.
//!
//! # Resolution priority
//!
//! 1. Explicit path (command-line `--config`)
//! 2. `WAYFINDER_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/wayfinder/config.toml` on Linux)
//! 4. Built-in defaults

use crate::time::millis_to_duration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WAYFINDER_CONFIG";

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Guidance backend connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the guidance service (`/navigate/` is appended)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Initial fix acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Accuracy radius (meters) that ends acquisition early
    #[serde(default = "default_accuracy_threshold_m")]
    pub accuracy_threshold_m: f64,

    /// Timeout passed to the location capability for each fix
    #[serde(default = "default_acquisition_fix_timeout_ms")]
    pub per_fix_timeout_ms: u64,

    /// Overall wait before falling back to the best fix seen
    #[serde(default = "default_overall_deadline_ms")]
    pub overall_deadline_ms: u64,
}

/// Continuous tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Minimum interval between backend syncs
    #[serde(default = "default_backend_update_interval_ms")]
    pub backend_update_interval_ms: u64,

    /// Timeout passed to the location capability for each tracked fix
    #[serde(default = "default_tracking_fix_timeout_ms")]
    pub per_fix_timeout_ms: u64,
}

/// Voice command recognition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceConfig {
    /// Phrases that turn a spoken destination into a start request
    #[serde(default = "default_trigger_phrases")]
    pub trigger_phrases: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_accuracy_threshold_m() -> f64 {
    20.0
}

fn default_acquisition_fix_timeout_ms() -> u64 {
    30_000
}

fn default_overall_deadline_ms() -> u64 {
    50_000
}

fn default_backend_update_interval_ms() -> u64 {
    10_000
}

fn default_tracking_fix_timeout_ms() -> u64 {
    5_000
}

fn default_trigger_phrases() -> Vec<String> {
    ["start navigation", "navigate", "let's go", "route"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold_m: default_accuracy_threshold_m(),
            per_fix_timeout_ms: default_acquisition_fix_timeout_ms(),
            overall_deadline_ms: default_overall_deadline_ms(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            backend_update_interval_ms: default_backend_update_interval_ms(),
            per_fix_timeout_ms: default_tracking_fix_timeout_ms(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            trigger_phrases: default_trigger_phrases(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        millis_to_duration(self.request_timeout_ms)
    }
}

impl AcquisitionConfig {
    pub fn per_fix_timeout(&self) -> Duration {
        millis_to_duration(self.per_fix_timeout_ms)
    }

    pub fn overall_deadline(&self) -> Duration {
        millis_to_duration(self.overall_deadline_ms)
    }
}

impl TrackingConfig {
    pub fn backend_update_interval(&self) -> Duration {
        millis_to_duration(self.backend_update_interval_ms)
    }

    pub fn per_fix_timeout(&self) -> Duration {
        millis_to_duration(self.per_fix_timeout_ms)
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject values the navigation core cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(Error::Config("backend.base_url must not be empty".to_string()));
        }
        if !(self.acquisition.accuracy_threshold_m > 0.0) {
            return Err(Error::Config(format!(
                "acquisition.accuracy_threshold_m must be positive (got {})",
                self.acquisition.accuracy_threshold_m
            )));
        }
        let positive_ms = [
            ("backend.request_timeout_ms", self.backend.request_timeout_ms),
            ("acquisition.per_fix_timeout_ms", self.acquisition.per_fix_timeout_ms),
            ("acquisition.overall_deadline_ms", self.acquisition.overall_deadline_ms),
            (
                "tracking.backend_update_interval_ms",
                self.tracking.backend_update_interval_ms,
            ),
            ("tracking.per_fix_timeout_ms", self.tracking.per_fix_timeout_ms),
        ];
        for (key, value) in positive_ms {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", key)));
            }
        }
        Ok(())
    }
}

/// Resolves which config file to read, falling back to built-in defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Path that would be read, in priority order (None means defaults only)
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|p| p.exists())
    }

    /// Load the resolved configuration
    ///
    /// A missing file falls back to defaults with a warning. A file that
    /// exists but does not parse or validate is an error.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let Some(path) = self.config_path() else {
            info!("No config file found, using built-in defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(TomlConfig::default());
        }

        info!("Loading configuration from {}", path.display());
        TomlConfig::load(&path)
    }
}

/// Platform config file location (`<config dir>/wayfinder/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wayfinder").join("config.toml"))
}
