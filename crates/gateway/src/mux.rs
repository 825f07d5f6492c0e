// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper over the `tmux` CLI (§4.E): create/list/send-to/kill/capture
//! named detached sessions. Every invocation is argv-only (no shell
//! interpolation) and bounded by a 5 s timeout; any spawn error or non-zero
//! exit collapses to a boolean failure for the caller.

use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Multiplexer driver backed by the `tmux` binary.
pub struct MultiplexerDriver {
    binary: String,
}

impl Default for MultiplexerDriver {
    fn default() -> Self {
        Self { binary: "tmux".to_string() }
    }
}

impl MultiplexerDriver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    /// Create a detached session named `name` running `argv` in `cwd`.
    pub async fn create_session(&self, name: &str, argv: &[String], cwd: &str) -> bool {
        if argv.is_empty() {
            return false;
        }
        let mut args = vec![
            "new-session".to_string(),
            "-d".to_string(),
            "-s".to_string(),
            name.to_string(),
            "-c".to_string(),
            cwd.to_string(),
        ];
        args.extend(argv.iter().cloned());
        self.run_ok(&args).await
    }

    /// Send literal `text` followed by Enter to `name`'s active pane.
    pub async fn send_keys(&self, name: &str, text: &str) -> bool {
        let args = vec!["send-keys".to_string(), "-t".to_string(), name.to_string(), "-l".to_string(), text.to_string()];
        if !self.run_ok(&args).await {
            return false;
        }
        let enter = vec!["send-keys".to_string(), "-t".to_string(), name.to_string(), "Enter".to_string()];
        self.run_ok(&enter).await
    }

    /// Send an interrupt (SIGINT-equivalent `C-c`) to `name`'s active pane.
    pub async fn send_interrupt(&self, name: &str) -> bool {
        let args = vec!["send-keys".to_string(), "-t".to_string(), name.to_string(), "C-c".to_string()];
        self.run_ok(&args).await
    }

    /// Kill the named session.
    pub async fn kill_session(&self, name: &str) -> bool {
        let args = vec!["kill-session".to_string(), "-t".to_string(), name.to_string()];
        self.run_ok(&args).await
    }

    /// Whether `name` currently exists.
    pub async fn is_alive(&self, name: &str) -> bool {
        let args = vec!["has-session".to_string(), "-t".to_string(), name.to_string()];
        self.run_ok(&args).await
    }

    /// List the names of all live sessions.
    pub async fn list_sessions(&self) -> Vec<String> {
        let args = vec!["list-sessions".to_string(), "-F".to_string(), "#{session_name}".to_string()];
        match self.run_capture(&args).await {
            Some(output) => output.lines().map(str::to_string).collect(),
            None => Vec::new(),
        }
    }

    /// Capture the trailing `lines` lines of `name`'s active pane.
    pub async fn capture_pane(&self, name: &str, lines: u32) -> Option<String> {
        let start = format!("-{lines}");
        let args = vec![
            "capture-pane".to_string(),
            "-t".to_string(),
            name.to_string(),
            "-p".to_string(),
            "-S".to_string(),
            start,
        ];
        self.run_capture(&args).await
    }

    async fn run_ok(&self, args: &[String]) -> bool {
        self.run_capture(args).await.is_some()
    }

    async fn run_capture(&self, args: &[String]) -> Option<String> {
        let fut = Command::new(&self.binary).args(args).output();
        match timeout(COMMAND_TIMEOUT, fut).await {
            Ok(Ok(output)) if output.status.success() => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            Ok(Ok(_)) | Ok(Err(_)) | Err(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
