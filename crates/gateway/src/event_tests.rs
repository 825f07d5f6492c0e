use super::*;

#[test]
fn risk_ordering_matches_safe_lt_moderate_lt_dangerous() {
    assert!(Risk::Safe < Risk::Moderate);
    assert!(Risk::Moderate < Risk::Dangerous);
}

#[test]
fn session_status_terminal_set() {
    assert!(SessionStatus::Done.is_terminal());
    assert!(SessionStatus::Stopped.is_terminal());
    assert!(SessionStatus::Error.is_terminal());
    assert!(!SessionStatus::Running.is_terminal());
    assert!(!SessionStatus::Waiting.is_terminal());
    assert!(!SessionStatus::Created.is_terminal());
}

#[test]
fn status_str_round_trip() {
    for status in [
        SessionStatus::Created,
        SessionStatus::Running,
        SessionStatus::Waiting,
        SessionStatus::Error,
        SessionStatus::Stopped,
        SessionStatus::Done,
    ] {
        assert_eq!(SessionStatus::from_str(status.as_str()), Some(status));
    }
}

#[test]
fn envelope_serializes_camelcase_session_id() {
    let env = Envelope::new(3, "heartbeat", None, serde_json::json!({"ok": true}));
    let value = serde_json::to_value(&env).expect("serialize");
    assert_eq!(value["sessionId"], serde_json::Value::Null);
    assert_eq!(value["seq"], 3);
    assert_eq!(value["v"], "1.0.0");
}

#[test]
fn iso8601_timestamp_has_expected_shape() {
    let ts = now_iso8601();
    assert!(ts.ends_with('Z'));
    assert_eq!(ts.len(), "2026-07-28T00:00:00.000Z".len());
}
