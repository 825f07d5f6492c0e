// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::Value;

use super::{Adapter, VersionRange};
use crate::event::{NormalizedEvent, NormalizedKind, PermissionPayload};
use crate::risk;

/// Gemini CLI's hook shape uses camelCase field names distinct from
/// Claude's: `{eventName, sessionId, toolName, toolArgs, workingDirectory}`.
pub struct GeminiAdapter;

impl Adapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn display_name(&self) -> &'static str {
        "Gemini CLI"
    }

    fn launch_binary(&self) -> &'static str {
        "gemini"
    }

    fn session_prefix(&self) -> &'static str {
        "ap-gm"
    }

    fn version_range(&self) -> VersionRange {
        VersionRange {
            min: Some("0.1.0"),
            max: None,
        }
    }

    fn hook_endpoints(&self) -> &'static [&'static str] {
        &["BeforeTool", "AfterTool", "Idle", "Notify", "Failure"]
    }

    fn normalize_hook_payload(&self, raw: &Value, endpoint: &str) -> Option<NormalizedEvent> {
        let session_id = raw.get("sessionId").and_then(Value::as_str).map(str::to_string);
        let cwd = raw.get("workingDirectory").and_then(Value::as_str).map(str::to_string);
        let tool_name = raw.get("toolName").and_then(Value::as_str).map(str::to_string);
        let tool_input = raw.get("toolArgs").cloned().unwrap_or(Value::Null);

        let kind = match endpoint {
            "BeforeTool" => NormalizedKind::PermissionRequest,
            "AfterTool" => NormalizedKind::ToolComplete,
            "Idle" => NormalizedKind::Stop,
            "Notify" => {
                let message = raw.get("text").and_then(Value::as_str).unwrap_or("");
                if message.is_empty() {
                    return None;
                }
                NormalizedKind::Notification
            }
            "Failure" => NormalizedKind::Error,
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
        let tool_name = raw.get("toolName").and_then(Value::as_str)?.to_string();
        let tool_input = raw.get("toolArgs").cloned().unwrap_or(Value::Null);
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
        let mut argv = vec!["gemini".to_string(), "--prompt".to_string()];
        argv.extend(flags.iter().cloned());
        if !task.is_empty() {
            argv.push(task.to_string());
        }
        argv
    }

    fn is_question_tool(&self, tool_name: &str) -> bool {
        tool_name.eq_ignore_ascii_case("AskUser")
    }

    fn response_marker(&self) -> &'static str {
        "\u{2726}"
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
