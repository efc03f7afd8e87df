//! Commands and responses of the brightd socket protocol.
//!
//! The protocol is one line in, one line out:
//!
//! | Request  | Response                                  |
//! |----------|-------------------------------------------|
//! | `inc`    | `ok`                                      |
//! | `dec`    | `ok`                                      |
//! | `get`    | `{"percentage": N}` or `error`            |
//! | `sleep`  | `ok` or `error`                           |
//! | `wakeup` | `ok` or `error`                           |
//! | other    | `Invalid command`                         |
//!
//! Requests are matched exactly after trimming surrounding whitespace.

use crate::traits::Level;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every request a client can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Step brightness up once (coalesced).
    Inc,
    /// Step brightness down once (coalesced).
    Dec,
    /// Report the current brightness as a percentage.
    Get,
    /// Put the display to sleep.
    Sleep,
    /// Wake the display up.
    Wakeup,
}

impl Command {
    /// The wire keyword for this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Inc => "inc",
            Command::Dec => "dec",
            Command::Get => "get",
            Command::Sleep => "sleep",
            Command::Wakeup => "wakeup",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request line that does not name any [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Parse a request line.  Case-sensitive; surrounding whitespace
    /// (including the trailing newline) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "inc" => Ok(Command::Inc),
            "dec" => Ok(Command::Dec),
            "get" => Ok(Command::Get),
            "sleep" => Ok(Command::Sleep),
            "wakeup" => Ok(Command::Wakeup),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// JSON payload of a successful `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrightnessReport {
    pub percentage: u32,
}

/// Every reply the daemon can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ok,
    Error,
    Brightness(BrightnessReport),
    InvalidCommand,
}

impl fmt::Display for Response {
    /// Renders the exact wire line, including the trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => writeln!(f, "ok"),
            Response::Error => writeln!(f, "error"),
            // Keep the space after the colon; status-bar scripts match on it.
            Response::Brightness(report) => {
                writeln!(f, "{{\"percentage\": {}}}", report.percentage)
            }
            Response::InvalidCommand => writeln!(f, "Invalid command"),
        }
    }
}

/// Convert a raw level into the percentage shown to clients.
///
/// A reported maximum of zero is replaced by `default_max`.  The result is
/// floored, and an exact zero is reported as `1` so status bars never show
/// a dark display as "off".
pub fn percentage(level: Level, default_max: u32) -> u32 {
    let max = if level.max == 0 { default_max } else { level.max };
    if max == 0 {
        return 1;
    }
    let percent = u64::from(level.current) * 100 / u64::from(max);
    match u32::try_from(percent) {
        Ok(0) => 1,
        Ok(p) => p,
        Err(_) => u32::MAX,
    }
}

//  Tests
