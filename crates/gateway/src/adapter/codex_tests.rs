use super::*;
use serde_json::json;

#[test]
fn function_call_normalizes_to_permission_request() {
    let adapter = CodexAdapter;
    let raw = json!({
        "conversation_id": "s3",
        "function": {"name": "shell", "arguments": {"command": "ls"}},
        "cwd": "/tmp",
    });
    let normalized = adapter.normalize_hook_payload(&raw, "FunctionCall").expect("normalized");
    assert_eq!(normalized.kind, NormalizedKind::PermissionRequest);
    assert_eq!(normalized.tool_name.as_deref(), Some("shell"));
}

#[test]
fn extract_permission_requires_function_field() {
    let adapter = CodexAdapter;
    assert!(adapter.extract_permission(&json!({"conversation_id": "s3"})).is_none());
}

#[test]
fn launch_command_uses_exec_subcommand() {
    let adapter = CodexAdapter;
    let argv = adapter.build_launch_command("task", &[]);
    assert_eq!(argv, vec!["codex", "exec", "task"]);
}
