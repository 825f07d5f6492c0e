// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified diff generation for `Write`/`Edit` tool calls (§4.C).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "pdf", "zip", "tar", "gz", "bin", "exe", "so", "dylib", "woff", "woff2", "ttf",
];

/// A single hunk of a unified diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub lines: Vec<String>,
}

/// Unified-diff result for a proposed `Write`/`Edit` (§4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    pub file_path: String,
    pub hunks: Vec<Hunk>,
    pub additions: usize,
    pub deletions: usize,
    pub is_binary: bool,
    pub is_truncated: bool,
}

/// Generate a diff for a `Write` or `Edit` tool call, or `None` when the
/// tool isn't one of those two or required inputs are missing (§4.C).
pub fn generate_diff(tool: &str, input: &Value, max_bytes: usize) -> Option<Diff> {
    match tool.to_lowercase().as_str() {
        "write" => generate_write_diff(input, max_bytes),
        "edit" => generate_edit_diff(input, max_bytes),
        _ => None,
    }
}

fn generate_write_diff(input: &Value, max_bytes: usize) -> Option<Diff> {
    let file_path = input.get("file_path").and_then(Value::as_str)?;
    let new_content = input.get("content").and_then(Value::as_str)?;

    if is_binary_path(file_path) {
        return Some(binary_diff(file_path));
    }

    let current = std::fs::read_to_string(file_path).unwrap_or_default();
    if current.len() > max_bytes || new_content.len() > max_bytes {
        return Some(binary_diff(file_path));
    }

    Some(build_diff(file_path, &current, new_content, max_bytes))
}

fn generate_edit_diff(input: &Value, max_bytes: usize) -> Option<Diff> {
    let file_path = input.get("file_path").and_then(Value::as_str)?;
    let old_string = input.get("old_string").and_then(Value::as_str)?;
    let new_string = input.get("new_string").and_then(Value::as_str).unwrap_or("");
    let replace_all = input.get("replace_all").and_then(Value::as_bool).unwrap_or(false);

    if is_binary_path(file_path) {
        return Some(binary_diff(file_path));
    }

    let current = std::fs::read_to_string(file_path).unwrap_or_default();
    if current.len() > max_bytes {
        return Some(binary_diff(file_path));
    }

    let simulated = if replace_all {
        current.replace(old_string, new_string)
    } else {
        current.replacen(old_string, new_string, 1)
    };

    Some(build_diff(file_path, &current, &simulated, max_bytes))
}

fn is_binary_path(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn binary_diff(file_path: &str) -> Diff {
    Diff {
        file_path: file_path.to_string(),
        hunks: Vec::new(),
        additions: 0,
        deletions: 0,
        is_binary: true,
        is_truncated: false,
    }
}

fn build_diff(file_path: &str, old: &str, new: &str, max_bytes: usize) -> Diff {
    let text_diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();
    let mut additions = 0usize;
    let mut deletions = 0usize;
    let mut accumulated_bytes = 0usize;
    let mut is_truncated = false;

    for group in text_diff.grouped_ops(3) {
        if is_truncated {
            break;
        }

        let mut lines = Vec::new();
        let (mut old_start, mut new_start) = (0usize, 0usize);
        let mut old_lines = 0usize;
        let mut new_lines = 0usize;
        let mut first = true;

        for op in &group {
            for change in text_diff.iter_changes(op) {
                if first {
                    old_start = change.old_index().unwrap_or(0) + 1;
                    new_start = change.new_index().unwrap_or(0) + 1;
                    first = false;
                }
                let prefix = match change.tag() {
                    ChangeTag::Delete => {
                        deletions += 1;
                        old_lines += 1;
                        "-"
                    }
                    ChangeTag::Insert => {
                        additions += 1;
                        new_lines += 1;
                        "+"
                    }
                    ChangeTag::Equal => {
                        old_lines += 1;
                        new_lines += 1;
                        " "
                    }
                };
                let line = format!("{prefix}{}", change.value().trim_end_matches('\n'));
                accumulated_bytes += line.len();
                lines.push(line);
            }
        }

        if accumulated_bytes > max_bytes {
            is_truncated = true;
            break;
        }

        hunks.push(Hunk {
            old_start,
            old_lines,
            new_start,
            new_lines,
            lines,
        });
    }

    Diff {
        file_path: file_path.to_string(),
        hunks,
        additions,
        deletions,
        is_binary: false,
        is_truncated,
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
