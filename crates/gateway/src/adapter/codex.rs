// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::Value;

use super::{Adapter, VersionRange};
use crate::event::{NormalizedEvent, NormalizedKind, PermissionPayload};
use crate::risk;

/// Codex's hook shape nests the call under `function`: `{type,
/// conversation_id, function: {name, arguments}, cwd}`.
pub struct CodexAdapter;

impl Adapter for CodexAdapter {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn display_name(&self) -> &'static str {
        "Codex CLI"
    }

    fn launch_binary(&self) -> &'static str {
        "codex"
    }

    fn session_prefix(&self) -> &'static str {
        "ap-cx"
    }

    fn version_range(&self) -> VersionRange {
        VersionRange {
            min: Some("0.2.0"),
            max: None,
        }
    }

    fn hook_endpoints(&self) -> &'static [&'static str] {
        &["FunctionCall", "FunctionResult", "TurnEnd", "Notice", "Fault"]
    }

    fn normalize_hook_payload(&self, raw: &Value, endpoint: &str) -> Option<NormalizedEvent> {
        let session_id = raw.get("conversation_id").and_then(Value::as_str).map(str::to_string);
        let cwd = raw.get("cwd").and_then(Value::as_str).map(str::to_string);
        let function = raw.get("function");
        let tool_name = function.and_then(|f| f.get("name")).and_then(Value::as_str).map(str::to_string);
        let tool_input = function.and_then(|f| f.get("arguments")).cloned().unwrap_or(Value::Null);

        let kind = match endpoint {
            "FunctionCall" => NormalizedKind::PermissionRequest,
            "FunctionResult" => NormalizedKind::ToolComplete,
            "TurnEnd" => NormalizedKind::Stop,
            "Notice" => {
                let message = raw.get("text").and_then(Value::as_str).unwrap_or("");
                if message.is_empty() {
                    return None;
                }
                NormalizedKind::Notification
            }
            "Fault" => NormalizedKind::Error,
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
        let function = raw.get("function")?;
        let tool_name = function.get("name").and_then(Value::as_str)?.to_string();
        let tool_input = function.get("arguments").cloned().unwrap_or(Value::Null);
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
        let mut argv = vec!["codex".to_string(), "exec".to_string()];
        argv.extend(flags.iter().cloned());
        if !task.is_empty() {
            argv.push(task.to_string());
        }
        argv
    }

    fn is_question_tool(&self, tool_name: &str) -> bool {
        tool_name.eq_ignore_ascii_case("ask_user")
    }

    fn response_marker(&self) -> &'static str {
        ">>"
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
