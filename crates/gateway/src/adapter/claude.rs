// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::Value;

use super::{Adapter, VersionRange};
use crate::event::{NormalizedEvent, NormalizedKind, PermissionPayload};
use crate::risk;

/// Claude Code's hook shape: `{hook_event_name, session_id, tool_name,
/// tool_input, cwd, stop_hook_active, message}`.
pub struct ClaudeAdapter;

impl Adapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn display_name(&self) -> &'static str {
        "Claude Code"
    }

    fn launch_binary(&self) -> &'static str {
        "claude"
    }

    fn session_prefix(&self) -> &'static str {
        "ap-cc"
    }

    fn version_range(&self) -> VersionRange {
        VersionRange {
            min: Some("1.0.0"),
            max: None,
        }
    }

    fn hook_endpoints(&self) -> &'static [&'static str] {
        &["PreToolUse", "PostToolUse", "Stop", "Notification", "Error"]
    }

    fn normalize_hook_payload(&self, raw: &Value, endpoint: &str) -> Option<NormalizedEvent> {
        let session_id = raw.get("session_id").and_then(Value::as_str).map(str::to_string);
        let cwd = raw.get("cwd").and_then(Value::as_str).map(str::to_string);
        let tool_name = raw.get("tool_name").and_then(Value::as_str).map(str::to_string);
        let tool_input = raw.get("tool_input").cloned().unwrap_or(Value::Null);

        let kind = match endpoint {
            "PreToolUse" => NormalizedKind::PermissionRequest,
            "PostToolUse" => NormalizedKind::ToolComplete,
            "Stop" => NormalizedKind::Stop,
            "Notification" => {
                let message = raw.get("message").and_then(Value::as_str).unwrap_or("");
                if message.is_empty() {
                    return None;
                }
                NormalizedKind::Notification
            }
            "Error" => NormalizedKind::Error,
            _ => return None,
        };

        Some(NormalizedEvent {
            kind,
            session_id,
            tool_name,
            tool_input,
            raw: raw.clone(),
            multiplexer_session_hint: None,
            cwd,
        })
    }

    fn extract_permission(&self, raw: &Value) -> Option<PermissionPayload> {
        let tool_name = raw.get("tool_name").and_then(Value::as_str)?.to_string();
        let tool_input = raw.get("tool_input").cloned().unwrap_or(Value::Null);
        let risk_level = risk::classify(&tool_name, &tool_input);
        Some(PermissionPayload {
            request_id: uuid::Uuid::new_v4(),
            tool_category: tool_name.clone(),
            summary: risk::summarize(&tool_name, &tool_input),
            target: risk::extract_target(&tool_name, &tool_input),
            diff: None,
            tool_name,
            risk_level,
            tool_input,
            raw_payload: raw.clone(),
        })
    }

    fn build_launch_command(&self, task: &str, flags: &[String]) -> Vec<String> {
        let mut argv = vec!["claude".to_string()];
        argv.extend(flags.iter().cloned());
        if !task.is_empty() {
            argv.push(task.to_string());
        }
        argv
    }

    fn is_question_tool(&self, tool_name: &str) -> bool {
        tool_name.eq_ignore_ascii_case("AskUserQuestion")
    }

    fn response_marker(&self) -> &'static str {
        "\u{25cf}"
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
