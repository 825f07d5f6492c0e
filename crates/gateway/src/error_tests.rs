use super::*;

#[test]
fn http_status_matches_taxonomy() {
    assert_eq!(ErrorCode::UnknownAgent.http_status(), 400);
    assert_eq!(ErrorCode::PayloadTooLarge.http_status(), 413);
    assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
    assert_eq!(ErrorCode::Internal.http_status(), 500);
}

#[test]
fn as_str_round_trips_through_display() {
    assert_eq!(ErrorCode::ProtocolError.to_string(), "PROTOCOL_ERROR");
    assert_eq!(ErrorCode::ProtocolError.as_str(), "PROTOCOL_ERROR");
}

#[test]
fn body_carries_message() {
    let body = ErrorCode::NotFound.body("no such session");
    assert_eq!(body.code, "NOT_FOUND");
    assert_eq!(body.message, "no such session");
}
