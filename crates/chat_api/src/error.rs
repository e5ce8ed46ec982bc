use chat_stream::{Cancelled, SessionError};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid request payload: {0}")]
    InvalidRequestPayload(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),

    #[error("retry exhausted after max attempts (status: {}, last_error: {last_error:?})", display_status(.status))]
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },

    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("request was cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ChatApiError {
    /// Whether this failure should be shown to the user as a failed send.
    pub fn is_transport_failure(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl From<Cancelled> for ChatApiError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<SessionError> for ChatApiError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Transport(message) => Self::StreamInterrupted(message),
            SessionError::Cancelled => Self::Cancelled,
        }
    }
}

fn display_status(status: &Option<StatusCode>) -> String {
    status
        .map(|status| status.as_u16().to_string())
        .unwrap_or_else(|| "n/a".to_owned())
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorPayload {
    fn message(&self) -> Option<String> {
        let nested = match &self.error {
            Some(Value::String(message)) => Some(message.as_str()),
            Some(Value::Object(fields)) => fields.get("message").and_then(Value::as_str),
            _ => None,
        };

        nested
            .or(self.message.as_deref())
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_owned)
    }
}

/// Extract a user-facing message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Some(message) = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.message())
    {
        return message;
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
