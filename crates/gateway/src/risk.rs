// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure, deterministic risk classification. No I/O — see §4.B; the
//! orchestrator is responsible for logging the outcome at the call site.

use serde_json::Value;

use crate::event::Risk;

const READ_ONLY_TOOLS: &[&str] = &[
    "read",
    "grep",
    "glob",
    "websearch",
    "webfetch",
    "task-listing",
    "tasklist",
    "askuserquestion",
];

const DESTRUCTIVE_PATTERNS: &[&str] = &[
    "rm -rf",
    "rm -r -f",
    "rm -fr",
    "mkfs",
    "format c:",
    "git reset --hard",
    "git push --force",
    "git push -f",
    "drop table",
    "drop database",
    "of=/dev/",
    "shutdown",
    "reboot",
    "kill -9",
    "kill -kill",
    "chmod 777",
    "chmod -r 777",
    "chown -r",
];

const MODERATE_SHELL_PATTERNS: &[&str] = &["npm install", "pip install", "cargo install", "apt install", "apt-get install", "brew install", "yarn add"];

const FETCH_UTILITIES: &[&str] = &["curl ", "wget ", "curl\t", "wget\t"];

const SYSTEM_DIR_PREFIXES: &[&str] = &["/etc", "/usr", "/var", "/boot", "/sys", "/proc"];

const CREDENTIAL_EXTENSIONS: &[&str] = &["env", "pem", "key", "crt", "p12", "pfx", "jks", "keystore"];

/// Classify `(tool, input)` into a [`Risk`] level per §4.B's rule table.
pub fn classify(tool: &str, input: &Value) -> Risk {
    let tool_lower = tool.to_lowercase();

    if READ_ONLY_TOOLS.iter().any(|t| tool_lower.contains(t)) {
        return Risk::Safe;
    }

    if is_shell_tool(&tool_lower) {
        return classify_shell(input);
    }

    if is_write_tool(&tool_lower) {
        return classify_write(input);
    }

    Risk::Moderate
}

fn is_shell_tool(tool_lower: &str) -> bool {
    matches!(tool_lower, "bash" | "shell" | "exec" | "run_command" | "execute" | "powershell")
}

fn is_write_tool(tool_lower: &str) -> bool {
    matches!(tool_lower, "write" | "edit" | "notebookedit" | "notebook_edit" | "multiedit")
}

fn classify_shell(input: &Value) -> Risk {
    let command = extract_command(input).unwrap_or_default();
    let lower = command.to_lowercase();

    if DESTRUCTIVE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Risk::Dangerous;
    }
    if is_plain_delete(&lower) {
        return Risk::Moderate;
    }
    if MODERATE_SHELL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Risk::Moderate;
    }
    if FETCH_UTILITIES.iter().any(|p| lower.contains(p.trim_end())) {
        return Risk::Moderate;
    }
    Risk::Safe
}

fn is_plain_delete(lower: &str) -> bool {
    let trimmed = lower.trim_start();
    (trimmed.starts_with("rm ") || trimmed == "rm") && !DESTRUCTIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

fn classify_write(input: &Value) -> Risk {
    let path = extract_path(input).unwrap_or_default();
    let lower = path.to_lowercase();

    if SYSTEM_DIR_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Risk::Dangerous;
    }
    if let Some(ext) = lower.rsplit('.').next() {
        if CREDENTIAL_EXTENSIONS.contains(&ext) {
            return Risk::Moderate;
        }
    }
    Risk::Safe
}

fn extract_command(input: &Value) -> Option<String> {
    input
        .get("command")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn extract_path(input: &Value) -> Option<String> {
    input
        .get("file_path")
        .or_else(|| input.get("path"))
        .or_else(|| input.get("notebook_path"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Human-readable one-line summary of the proposed action (§4.B), truncated
/// at 120 chars.
pub fn summarize(tool: &str, input: &Value) -> String {
    let raw = if let Some(cmd) = extract_command(input) {
        format!("{tool}: {cmd}")
    } else if let Some(path) = extract_path(input) {
        format!("{tool}: {path}")
    } else {
        format!("{tool}: {input}")
    };
    truncate_chars(&raw, 120)
}

/// Extract the human-facing "target" of an action: command, path, pattern,
/// or a stringified-and-truncated fallback of the whole input.
pub fn extract_target(tool: &str, input: &Value) -> String {
    if let Some(cmd) = extract_command(input) {
        return cmd;
    }
    if let Some(path) = extract_path(input) {
        return path;
    }
    if let Some(pattern) = input.get("pattern").and_then(Value::as_str) {
        return pattern.to_string();
    }
    let _ = tool;
    truncate_chars(&input.to_string(), 120)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

#[cfg(test)]
#[path = "risk_tests.rs"]
mod tests;
