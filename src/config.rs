//! Application configuration.
//!
//! The configuration is loaded from a JSON file, either the path given with
//! `--config <path>` or `$XDG_CONFIG_HOME/brightd/config.json`.  Every field
//! is optional, so `{}` is a valid file.
//!
//! # Example
//!
//! ```json
//! {
//!   "socket_path": "/tmp/brightness.sock",
//!   "debounce_ms": 300,
//!   "step": 10,
//!   "default_max": 100,
//!   "display": { "ddcutil": "ddcutil", "display": "1", "vcp_code": "10" },
//!   "notifier": { "enabled": true, "process": "waybar", "signal": "SIGRTMIN+5" }
//! }
//! ```

use crate::ddcutil::display::DisplayConfig;
use crate::engine::{EngineSettings, DEFAULT_STEP, DEFAULT_WINDOW};
use crate::ipc::dispatch::DEFAULT_MAX;
use crate::ipc::listener::DEFAULT_SOCKET_PATH;
use crate::waybar::NotifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the command socket is created.
    pub socket_path: PathBuf,
    /// Length of the debounce window in **milliseconds**.
    pub debounce_ms: u64,
    /// Brightness change per `inc`/`dec`.
    pub step: u32,
    /// Maximum assumed by `get` when the monitor reports zero.
    pub default_max: u32,
    /// Which monitor to drive.
    pub display: DisplayConfig,
    /// Which status bar to refresh after an adjustment.
    pub notifier: NotifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            debounce_ms: DEFAULT_WINDOW.as_millis() as u64,
            step: DEFAULT_STEP,
            default_max: DEFAULT_MAX,
            display: DisplayConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError("debounce_ms must be greater than zero".into()));
        }
        Ok(())
    }

    /// Engine tuning derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            window: Duration::from_millis(self.debounce_ms),
            step: self.step,
        }
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
