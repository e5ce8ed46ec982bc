//! Frame classification.
//!
//! Each [`RawFrame`] maps to exactly one [`StreamEvent`]. Classification order:
//! a truthy `complete` marker wins, then a non-empty `content` string, and
//! anything else is [`StreamEvent::Malformed`].

use serde_json::{Map, Value};

use crate::decoder::RawFrame;
use crate::events::{Completion, ResponseMetrics, StreamEvent};

pub const FIELD_CONTENT: &str = "content";
pub const FIELD_COMPLETE: &str = "complete";
pub const FIELD_CONVERSATION_ID: &str = "conversationId";
pub const FIELD_HTML_CONTENT: &str = "htmlContent";
pub const FIELD_MODEL: &str = "model";
pub const FIELD_TOKENS_PER_SECOND: &str = "tokensPerSecond";
pub const FIELD_TIME_TO_FIRST_TOKEN_MS: &str = "timeToFirstTokenMs";
pub const FIELD_TOTAL_RESPONSE_TIME_MS: &str = "totalResponseTimeMs";

/// Interpret one frame.
pub fn interpret(frame: &RawFrame) -> StreamEvent {
    interpret_payload(frame.payload())
}

/// Interpret a raw payload string.
pub fn interpret_payload(payload: &str) -> StreamEvent {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(payload) else {
        return StreamEvent::malformed(payload);
    };

    if object.get(FIELD_COMPLETE).is_some_and(is_truthy) {
        return StreamEvent::Completion(completion_from(&object));
    }

    if let Some(text) = non_empty_str(&object, FIELD_CONTENT) {
        return StreamEvent::ContentDelta {
            text: text.to_owned(),
            conversation_id: non_empty_str(&object, FIELD_CONVERSATION_ID).map(str::to_owned),
        };
    }

    StreamEvent::malformed(payload)
}

fn completion_from(object: &Map<String, Value>) -> Completion {
    let owned = |field: &str| non_empty_str(object, field).map(str::to_owned);

    Completion {
        final_text: owned(FIELD_CONTENT),
        html_final_text: owned(FIELD_HTML_CONTENT),
        conversation_id: owned(FIELD_CONVERSATION_ID),
        metrics: ResponseMetrics {
            model: owned(FIELD_MODEL),
            tokens_per_second: number(object, FIELD_TOKENS_PER_SECOND),
            time_to_first_token_ms: number(object, FIELD_TIME_TO_FIRST_TOKEN_MS),
            total_response_time_ms: number(object, FIELD_TOTAL_RESPONSE_TIME_MS),
        },
    }
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn number(object: &Map<String, Value>, field: &str) -> Option<f64> {
    object
        .get(field)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
