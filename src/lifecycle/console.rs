//! Operator console on stdin.
//!
//! Lines are read on a dedicated OS thread and forwarded as
//! `ControlCommand`s to the control loop in `main`.

use std::io::BufRead;
use std::thread;

use tokio::sync::mpsc;

use crate::config::ConfigHandle;

/// A command typed by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Re-read and apply the config file.
    Reload,
    /// Print the active config.
    ShowConfig,
    Help,
}

impl ControlCommand {
    /// Parse one console line. Case and surrounding whitespace are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "reload" => Some(ControlCommand::Reload),
            "config" | "show" => Some(ControlCommand::ShowConfig),
            "help" | "?" => Some(ControlCommand::Help),
            _ => None,
        }
    }
}

const HELP: &str = "Commands: reload (apply config file changes), config (show active config), help";

/// Forward commands from `input` until EOF or until the receiver is gone.
pub fn run_console<R: BufRead>(input: R, tx: mpsc::Sender<ControlCommand>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Console read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match ControlCommand::parse(&line) {
            Some(command) => {
                if tx.blocking_send(command).is_err() {
                    break;
                }
            }
            None => tracing::warn!(command = %line.trim(), "Unknown command; type \"help\""),
        }
    }
    tracing::debug!("Console closed");
}

/// Read commands from stdin on a background thread.
pub fn spawn_console(tx: mpsc::Sender<ControlCommand>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || run_console(std::io::stdin().lock(), tx))
}

/// Carry out `command` against the active config.
pub fn execute(command: ControlCommand, config: &ConfigHandle) {
    match command {
        ControlCommand::Reload => {
            // failures are logged by the handle; the old config stays active
            let _ = config.reload();
        }
        ControlCommand::ShowConfig => match config.source() {
            Some(path) => tracing::info!(source = %path.display(), "{}", config.snapshot().summary()),
            None => tracing::info!("{}", config.snapshot().summary()),
        },
        ControlCommand::Help => tracing::info!("{}", HELP),
    }
}
