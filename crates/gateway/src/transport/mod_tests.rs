use super::*;

#[test]
fn approve_action_deserializes_camel_case_fields() {
    let raw = serde_json::json!({
        "type": "approve",
        "requestId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
        "scope": "session"
    });
    let action: Action = serde_json::from_value(raw).expect("deserialize");
    match action {
        Action::Approve { scope, .. } => assert_eq!(scope.as_deref(), Some("session")),
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn resume_from_seq_requires_both_fields() {
    let raw = serde_json::json!({
        "type": "resume_from_seq",
        "sessionId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
        "sinceSeq": 42
    });
    let action: Action = serde_json::from_value(raw).expect("deserialize");
    match action {
        Action::ResumeFromSeq { since_seq, .. } => assert_eq!(since_seq, 42),
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn unknown_action_type_fails_to_deserialize() {
    let raw = serde_json::json!({"type": "not_a_real_action"});
    let result: Result<Action, _> = serde_json::from_value(raw);
    assert!(result.is_err());
}

#[test]
fn transport_seq_is_monotonic_starting_at_one() {
    let seq = TransportSeq::default();
    assert_eq!(seq.next(), 1);
    assert_eq!(seq.next(), 2);
    assert_eq!(seq.next(), 3);
}
