//! Command-line client for brightd.
//!
//! Sends one command and prints the reply, for use in keybindings and
//! status-bar scripts:
//!
//!     brightctl inc
//!     brightctl get            # prints the bare percentage, e.g. `40`
//!     brightctl --socket /run/user/1000/brightd.sock sleep
//!
//! Exits with status 1 if the daemon is unreachable or answers with an
//! error.

use brightd::command::{BrightnessReport, Command};
use brightd::ipc::listener::DEFAULT_SOCKET_PATH;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error("usage: brightctl [--socket <path>] <inc|dec|get|sleep|wakeup>")]
    Usage,
    #[error("cannot reach brightd at {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad reply {0:?}: {1}")]
    Reply(String, serde_json::Error),
    #[error("brightd answered: {0}")]
    Rejected(String),
}

fn parse_args() -> Result<(PathBuf, Command), ClientError> {
    let mut socket = PathBuf::from(DEFAULT_SOCKET_PATH);
    let mut command = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--socket" {
            socket = args.next().map(PathBuf::from).ok_or(ClientError::Usage)?;
        } else if command.is_none() {
            command = Some(arg.parse::<Command>().map_err(|_| ClientError::Usage)?);
        } else {
            return Err(ClientError::Usage);
        }
    }
    Ok((socket, command.ok_or(ClientError::Usage)?))
}

fn send(path: PathBuf, command: Command) -> Result<String, ClientError> {
    let mut stream =
        UnixStream::connect(&path).map_err(|source| ClientError::Connect { path, source })?;
    writeln!(stream, "{}", command)?;
    let mut reply = String::new();
    stream.read_to_string(&mut reply)?;
    let reply = reply.trim().to_string();

    if matches!(reply.as_str(), "error" | "Invalid command" | "") {
        return Err(ClientError::Rejected(reply));
    }
    if command == Command::Get {
        let report: BrightnessReport =
            serde_json::from_str(&reply).map_err(|e| ClientError::Reply(reply.clone(), e))?;
        return Ok(report.percentage.to_string());
    }
    Ok(reply)
}

fn main() -> ExitCode {
    let result = parse_args().and_then(|(path, command)| send(path, command));
    match result {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
