use super::*;
use serde_json::json;

#[test]
fn pre_tool_use_normalizes_to_permission_request() {
    let adapter = ClaudeAdapter;
    let raw = json!({
        "session_id": "s1",
        "tool_name": "Bash",
        "tool_input": {"command": "ls"},
        "cwd": "/tmp",
    });
    let normalized = adapter.normalize_hook_payload(&raw, "PreToolUse").expect("normalized");
    assert_eq!(normalized.kind, NormalizedKind::PermissionRequest);
    assert_eq!(normalized.session_id.as_deref(), Some("s1"));
    assert_eq!(normalized.tool_name.as_deref(), Some("Bash"));
}

#[test]
fn empty_notification_message_is_dropped() {
    let adapter = ClaudeAdapter;
    let raw = json!({"session_id": "s1", "message": ""});
    assert!(adapter.normalize_hook_payload(&raw, "Notification").is_none());
}

#[test]
fn unknown_endpoint_returns_none() {
    let adapter = ClaudeAdapter;
    assert!(adapter.normalize_hook_payload(&json!({}), "SomethingElse").is_none());
}

#[test]
fn extract_permission_classifies_risk() {
    let adapter = ClaudeAdapter;
    let raw = json!({"tool_name": "Bash", "tool_input": {"command": "rm -rf /"}});
    let payload = adapter.extract_permission(&raw).expect("payload");
    assert_eq!(payload.risk_level, crate::event::Risk::Dangerous);
}

#[test]
fn launch_command_includes_flags_and_task() {
    let adapter = ClaudeAdapter;
    let argv = adapter.build_launch_command("fix the bug", &["--resume".to_string()]);
    assert_eq!(argv, vec!["claude", "--resume", "fix the bug"]);
}
