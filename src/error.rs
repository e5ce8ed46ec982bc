use thiserror::Error;

/// Abnormal end of a streamed session.
///
/// Only transport-level failures and cancellation end a session early. Frame
/// level anomalies are absorbed by the controller and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("session was cancelled")]
    Cancelled,
}

impl SessionError {
    pub fn transport(error: impl std::fmt::Display) -> Self {
        Self::Transport(error.to_string())
    }
}

/// Returned when a cancellation signal fires while awaiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

impl From<Cancelled> for SessionError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
