use super::*;

#[test]
fn equal_strings_match() {
    assert!(constant_time_eq("secret-token", "secret-token"));
}

#[test]
fn differing_strings_do_not_match() {
    assert!(!constant_time_eq("secret-token", "other-token"));
}

#[test]
fn differing_lengths_do_not_match() {
    assert!(!constant_time_eq("short", "much-longer-string"));
}

#[test]
fn extract_bearer_strips_prefix() {
    assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
    assert_eq!(extract_bearer("Basic abc123"), None);
}
