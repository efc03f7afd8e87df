//! Status-bar [`Notifier`] that signals a running bar process.
//!
//! Waybar's `custom` modules re-run their `exec` script when they receive
//! `SIGRTMIN+<n>` (the module's `signal` setting), so sending that signal is
//! enough to refresh the brightness widget.

use crate::traits::Notifier;
use log::info;
use serde::{Deserialize, Serialize};
use std::process::Command;

/// Which process to signal, and with what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// When `false`, [`SignalNotifier::notify`] does nothing.
    pub enabled: bool,
    /// Process name passed to `pkill`.  Default: `"waybar"`.
    pub process: String,
    /// Signal name passed to `pkill`.  Default: `"SIGRTMIN+5"`.
    pub signal: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            process: "waybar".into(),
            signal: "SIGRTMIN+5".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to run pkill: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("pkill {signal} {process} exited with {status}")]
    Failed {
        signal: String,
        process: String,
        status: String,
    },
}

/// Sends a signal to a process by name via `pkill`.
#[derive(Debug, Clone)]
pub struct SignalNotifier {
    config: NotifierConfig,
}

impl SignalNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self { config }
    }

    fn pkill_args(&self) -> [String; 2] {
        [format!("-{}", self.config.signal), self.config.process.clone()]
    }
}

impl Notifier for SignalNotifier {
    type Error = NotifyError;

    fn notify(&self) -> Result<(), NotifyError> {
        if !self.config.enabled {
            return Ok(());
        }
        info!("signalling {} with {}", self.config.process, self.config.signal);
        let status = Command::new("pkill").args(self.pkill_args()).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Failed {
                signal: self.config.signal.clone(),
                process: self.config.process.clone(),
                status: status.to_string(),
            })
        }
    }
}
