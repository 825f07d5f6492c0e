use super::*;
use serde_json::json;

#[test]
fn read_tool_is_always_safe() {
    assert_eq!(classify("Read", &json!({"file_path": "/tmp/x"})), Risk::Safe);
}

#[test]
fn recursive_force_delete_is_dangerous() {
    let input = json!({"command": "rm -rf /tmp/junk"});
    assert_eq!(classify("Bash", &input), Risk::Dangerous);
}

#[test]
fn plain_delete_is_moderate() {
    let input = json!({"command": "rm old.log"});
    assert_eq!(classify("Bash", &input), Risk::Moderate);
}

#[test]
fn package_install_is_moderate() {
    let input = json!({"command": "npm install lodash"});
    assert_eq!(classify("Bash", &input), Risk::Moderate);
}

#[test]
fn network_fetch_is_moderate() {
    let input = json!({"command": "curl example.com"});
    assert_eq!(classify("Bash", &input), Risk::Moderate);
}

#[test]
fn plain_listing_is_safe() {
    let input = json!({"command": "ls"});
    assert_eq!(classify("Bash", &input), Risk::Safe);
}

#[test]
fn write_to_system_dir_is_dangerous() {
    let input = json!({"file_path": "/etc/passwd"});
    assert_eq!(classify("Write", &input), Risk::Dangerous);
}

#[test]
fn write_to_credential_extension_is_moderate() {
    let input = json!({"file_path": "/home/user/app.pem"});
    assert_eq!(classify("Edit", &input), Risk::Moderate);
}

#[test]
fn write_to_ordinary_path_is_safe() {
    let input = json!({"file_path": "/home/user/notes.md"});
    assert_eq!(classify("Write", &input), Risk::Safe);
}

#[test]
fn unknown_tool_defaults_to_moderate() {
    assert_eq!(classify("WeirdCustomTool", &json!({})), Risk::Moderate);
}

#[test]
fn classify_is_pure_and_deterministic() {
    let input = json!({"command": "git push --force origin main"});
    let a = classify("Bash", &input);
    let b = classify("Bash", &input);
    assert_eq!(a, b);
    assert_eq!(a, Risk::Dangerous);
}

#[test]
fn summarize_truncates_at_120_chars() {
    let long_cmd = "x".repeat(200);
    let summary = summarize("Bash", &json!({"command": long_cmd}));
    assert_eq!(summary.chars().count(), 120);
}

#[test]
fn extract_target_prefers_command_then_path_then_pattern() {
    assert_eq!(extract_target("Bash", &json!({"command": "ls -la"})), "ls -la");
    assert_eq!(extract_target("Write", &json!({"file_path": "/tmp/a"})), "/tmp/a");
    assert_eq!(extract_target("Grep", &json!({"pattern": "TODO"})), "TODO");
}
