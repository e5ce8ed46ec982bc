use std::time::Duration;

use chat_api::retry::{is_transient_failure, parse_retry_after, RetryPolicy, MAX_DELAY};
use reqwest::StatusCode;

#[test]
fn retry_transient_statuses_are_retried() {
    for code in [408, 429, 500, 502, 503, 504] {
        let status = StatusCode::from_u16(code).expect("valid status");
        assert!(is_transient_failure(status, ""), "status {code}");
    }
    assert!(!is_transient_failure(StatusCode::BAD_REQUEST, "bad request"));
    assert!(!is_transient_failure(StatusCode::UNAUTHORIZED, ""));
}

#[test]
fn retry_transient_body_text_is_retried() {
    assert!(is_transient_failure(StatusCode::BAD_REQUEST, "Rate limit exceeded"));
    assert!(is_transient_failure(StatusCode::FORBIDDEN, "model overloaded, try again"));
}

#[test]
fn retry_delay_doubles_and_is_capped() {
    let policy = RetryPolicy::new(3, Duration::from_millis(5));
    assert_eq!(policy.delay(0), Duration::from_millis(5));
    assert_eq!(policy.delay(3), Duration::from_millis(40));

    let slow = RetryPolicy::default();
    assert_eq!(slow.delay(1), Duration::from_millis(2000));
    assert_eq!(slow.delay(40), MAX_DELAY);
}

#[test]
fn retry_after_hint_overrides_backoff() {
    let policy = RetryPolicy::default();
    assert_eq!(parse_retry_after(" 2 "), Some(Duration::from_secs(2)));
    assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    assert_eq!(
        policy.delay_with_hint(0, Some(Duration::from_secs(2))),
        Duration::from_secs(2)
    );
    assert_eq!(
        policy.delay_with_hint(0, Some(Duration::from_secs(600))),
        MAX_DELAY
    );
    assert_eq!(policy.delay_with_hint(1, None), Duration::from_millis(2000));
}

#[test]
fn retry_budget_counts_attempts_after_the_first() {
    let policy = RetryPolicy::new(2, Duration::ZERO);
    assert!(policy.allows_retry_after(0));
    assert!(policy.allows_retry_after(1));
    assert!(!policy.allows_retry_after(2));
}
