use super::*;
use serde_json::json;
use std::io::Write;

#[test]
fn non_write_edit_tool_returns_none() {
    assert!(generate_diff("Bash", &json!({"command": "ls"}), 1024).is_none());
}

#[test]
fn write_missing_content_returns_none() {
    assert!(generate_diff("Write", &json!({"file_path": "/tmp/x"}), 1024).is_none());
}

#[test]
fn edit_missing_old_string_returns_none() {
    assert!(generate_diff("Edit", &json!({"file_path": "/tmp/x", "new_string": "y"}), 1024).is_none());
}

#[test]
fn write_against_absent_file_treats_current_as_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("new.txt");
    let input = json!({"file_path": path.to_str().unwrap(), "content": "hello\nworld\n"});
    let diff = generate_diff("Write", &input, 4096).expect("diff");
    assert_eq!(diff.additions, 2);
    assert_eq!(diff.deletions, 0);
    assert!(!diff.is_binary);
}

#[test]
fn edit_replaces_first_occurrence_by_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("f.txt");
    std::fs::write(&path, "foo\nfoo\n").expect("write");
    let input = json!({
        "file_path": path.to_str().unwrap(),
        "old_string": "foo",
        "new_string": "bar",
        "replace_all": false,
    });
    let diff = generate_diff("Edit", &input, 4096).expect("diff");
    assert_eq!(diff.additions, 1);
    assert_eq!(diff.deletions, 1);
}

#[test]
fn binary_extension_short_circuits_to_binary_marker() {
    let input = json!({"file_path": "/tmp/image.png", "content": "whatever"});
    let diff = generate_diff("Write", &input, 4096).expect("diff");
    assert!(diff.is_binary);
    assert!(diff.hunks.is_empty());
}

#[test]
fn oversized_file_is_treated_as_binary_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("big.txt");
    let mut f = std::fs::File::create(&path).expect("create");
    f.write_all(&vec![b'a'; 200]).expect("write");
    let input = json!({"file_path": path.to_str().unwrap(), "content": "small"});
    let diff = generate_diff("Write", &input, 64).expect("diff");
    assert!(diff.is_binary);
}
