use reqwest::StatusCode;

use chat_api::error::parse_error_message;
use chat_api::ChatApiError;
use chat_stream::SessionError;

#[test]
fn parse_error_message_reads_string_error_field() {
    let body = r#"{"error":"conversation not found"}"#;
    assert_eq!(
        parse_error_message(StatusCode::NOT_FOUND, body),
        "conversation not found"
    );
}

#[test]
fn parse_error_message_reads_nested_error_message() {
    let body = r#"{"error":{"code":"bad_request","message":"invalid model"}}"#;
    assert_eq!(
        parse_error_message(StatusCode::BAD_REQUEST, body),
        "invalid model"
    );
}

#[test]
fn parse_error_message_reads_top_level_message() {
    let body = r#"{"message":"slow down"}"#;
    assert_eq!(
        parse_error_message(StatusCode::TOO_MANY_REQUESTS, body),
        "slow down"
    );
}

#[test]
fn parse_error_message_falls_back_to_raw_body_then_reason() {
    assert_eq!(
        parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, "raw failure text"),
        "raw failure text"
    );
    assert_eq!(
        parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
        "Service Unavailable"
    );
}

#[test]
fn session_errors_map_to_transport_errors() {
    let interrupted = ChatApiError::from(SessionError::Transport("reset".to_owned()));
    assert!(matches!(interrupted, ChatApiError::StreamInterrupted(ref m) if m == "reset"));
    assert!(interrupted.is_transport_failure());

    let cancelled = ChatApiError::from(SessionError::Cancelled);
    assert!(matches!(cancelled, ChatApiError::Cancelled));
    assert!(!cancelled.is_transport_failure());
}

#[test]
fn retry_exhausted_display_reports_missing_status() {
    let error = ChatApiError::RetryExhausted {
        status: None,
        last_error: Some("connection refused".to_owned()),
    };
    assert_eq!(
        error.to_string(),
        "retry exhausted after max attempts (status: n/a, last_error: Some(\"connection refused\"))"
    );
}
