// src/browser.rs
// Open the served URL in the default browser through the platform opener

use std::error::Error;
use std::fmt;
use std::io;
use std::process::{Command, Stdio};

#[derive(Debug)]
pub enum BrowserError {
    NotAvailable(String),
    OpenFailed(String),
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::NotAvailable(msg) => write!(f, "No browser opener available: {}", msg),
            BrowserError::OpenFailed(msg) => write!(f, "Failed to open browser: {}", msg),
        }
    }
}

impl Error for BrowserError {}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BrowserCommand {
    program: &'static str,
    /// Arguments placed before the URL.
    args: &'static [&'static str],
}

#[derive(Debug)]
enum CommandError {
    NotFound,
    Failed(String),
}

impl BrowserCommand {
    fn execute(&self, url: &str) -> Result<(), CommandError> {
        let status = Command::new(self.program)
            .args(self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => CommandError::NotFound,
                _ => CommandError::Failed(err.to_string()),
            })?;

        if status.success() {
            Ok(())
        } else {
            let message = match status.code() {
                Some(code) => format!("exited with status {code}"),
                None => "process terminated by signal".to_string(),
            };
            Err(CommandError::Failed(message))
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn command_candidates() -> &'static [BrowserCommand] {
    &[BrowserCommand {
        program: "xdg-open",
        args: &[],
    }]
}

#[cfg(target_os = "macos")]
fn command_candidates() -> &'static [BrowserCommand] {
    &[BrowserCommand {
        program: "open",
        args: &[],
    }]
}

// The empty string is the window title `start` expects before a quoted argument
#[cfg(target_os = "windows")]
fn command_candidates() -> &'static [BrowserCommand] {
    &[BrowserCommand {
        program: "cmd",
        args: &["/C", "start", ""],
    }]
}

#[cfg(not(any(unix, target_os = "windows")))]
fn command_candidates() -> &'static [BrowserCommand] {
    &[]
}

/// Open `url` with the platform opener. Blocks until the opener returns.
pub fn open_url(url: &str) -> Result<(), BrowserError> {
    open_with(command_candidates(), url)
}

pub(crate) fn open_with(commands: &[BrowserCommand], url: &str) -> Result<(), BrowserError> {
    if commands.is_empty() {
        return Err(BrowserError::NotAvailable(
            "opening a browser is not supported on this platform".to_string(),
        ));
    }

    let mut not_found = Vec::new();
    let mut failures = Vec::new();

    for command in commands {
        match command.execute(url) {
            Ok(()) => {
                log::debug!("Opened {} with {}", url, command.program);
                return Ok(());
            }
            Err(CommandError::NotFound) => not_found.push(format!("{} not found", command.program)),
            Err(CommandError::Failed(reason)) => {
                failures.push(format!("{} failed: {}", command.program, reason))
            }
        }
    }

    if failures.is_empty() {
        Err(BrowserError::NotAvailable(not_found.join("; ")))
    } else {
        failures.extend(not_found);
        Err(BrowserError::OpenFailed(failures.join("; ")))
    }
}
