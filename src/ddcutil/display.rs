//! [`DeviceAdapter`] implementation backed by the `ddcutil` CLI.
//!
//! Brightness is VCP feature `10`; power is the DPMS feature `D6`.  Every
//! call spawns one short-lived `ddcutil` process, which typically takes
//! 50–200 ms because of the I²C round trip.

use crate::traits::{DeviceAdapter, Level};
use log::debug;
use serde::{Deserialize, Serialize};
use std::process::{Command, Output};

/// VCP code of the DPMS power-mode feature.
const POWER_VCP: &str = "D6";
const POWER_ON: &str = "01";
const POWER_OFF: &str = "04";

/// Which monitor and feature to drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Path or name of the `ddcutil` binary.  Default: `"ddcutil"`.
    pub ddcutil: String,
    /// Value passed to `--display`.  Default: `"1"`.
    pub display: String,
    /// Hex VCP code of the brightness feature.  Default: `"10"`.
    pub vcp_code: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            ddcutil: "ddcutil".into(),
            display: "1".into(),
            vcp_code: "10".into(),
        }
    }
}

/// Errors that can occur when talking to ddcutil.
#[derive(Debug, thiserror::Error)]
pub enum DdcutilError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("ddcutil exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("unexpected ddcutil output: {0:?}")]
    Parse(String),
}

/// A monitor controlled through `ddcutil`.
///
/// No state is kept between calls; every query re-reads the monitor.
#[derive(Debug, Clone)]
pub struct DdcutilDisplay {
    config: DisplayConfig,
}

impl DdcutilDisplay {
    pub fn new(config: DisplayConfig) -> Self {
        Self { config }
    }

    fn getvcp_args(&self) -> Vec<String> {
        vec![
            "getvcp".into(),
            self.config.vcp_code.clone(),
            "--brief".into(),
            "--display".into(),
            self.config.display.clone(),
        ]
    }

    fn setvcp_args(&self, code: &str, value: &str) -> Vec<String> {
        vec![
            "setvcp".into(),
            code.into(),
            value.into(),
            "--display".into(),
            self.config.display.clone(),
        ]
    }

    fn run(&self, args: &[String]) -> Result<Output, DdcutilError> {
        debug!("running {} {}", self.config.ddcutil, args.join(" "));
        let output = Command::new(&self.config.ddcutil)
            .args(args)
            .output()
            .map_err(|source| DdcutilError::Spawn {
                program: self.config.ddcutil.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(DdcutilError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Parse `ddcutil getvcp --brief` output: `VCP <code> C <current> <max>`.
///
/// `code` must match the requested feature (hex, case-insensitive).
pub fn parse_brief(output: &str, code: &str) -> Result<Level, DdcutilError> {
    let parse_err = || DdcutilError::Parse(output.trim().to_string());
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("VCP "))
        .ok_or_else(parse_err)?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        ["VCP", got, "C", current, max] if got.eq_ignore_ascii_case(code) => {
            let current = current.parse().map_err(|_| parse_err())?;
            let max = max.parse().map_err(|_| parse_err())?;
            Ok(Level { current, max })
        }
        _ => Err(parse_err()),
    }
}

impl DeviceAdapter for DdcutilDisplay {
    type Error = DdcutilError;

    fn query(&self) -> Result<Level, Self::Error> {
        let output = self.run(&self.getvcp_args())?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_brief(&stdout, &self.config.vcp_code)
    }

    fn set_level(&self, value: u32) -> Result<(), Self::Error> {
        let args = self.setvcp_args(&self.config.vcp_code, &value.to_string());
        self.run(&args).map(|_| ())
    }

    fn set_power(&self, on: bool) -> Result<(), Self::Error> {
        let mode = if on { POWER_ON } else { POWER_OFF };
        self.run(&self.setvcp_args(POWER_VCP, mode)).map(|_| ())
    }
}
