use super::*;
use serde_json::json;

#[test]
fn before_tool_normalizes_to_permission_request() {
    let adapter = GeminiAdapter;
    let raw = json!({
        "sessionId": "s2",
        "toolName": "run_shell_command",
        "toolArgs": {"command": "ls"},
        "workingDirectory": "/tmp",
    });
    let normalized = adapter.normalize_hook_payload(&raw, "BeforeTool").expect("normalized");
    assert_eq!(normalized.kind, NormalizedKind::PermissionRequest);
    assert_eq!(normalized.session_id.as_deref(), Some("s2"));
}

#[test]
fn launch_command_uses_prompt_flag() {
    let adapter = GeminiAdapter;
    let argv = adapter.build_launch_command("do the thing", &[]);
    assert_eq!(argv, vec!["gemini", "--prompt", "do the thing"]);
}

#[test]
fn session_prefix_is_distinct_from_claude() {
    assert_eq!(GeminiAdapter.session_prefix(), "ap-gm");
}
