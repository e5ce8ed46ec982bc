//! Streaming chat response pipeline.
//!
//! Data flow: raw chunks → [`FrameDecoder`] → ordered [`RawFrame`]s →
//! [`interpret`] → [`StreamEvent`]s → [`SessionController`] → render target
//! mutations plus terminal metrics.
//!
//! Invariant: frames are applied strictly in arrival order and nothing touches
//! the render target once a session has terminated.
//!
//! # Public API Overview
//! - Decode chunked `data:` streams with [`FrameDecoder`]; it tolerates splits
//!   anywhere, including inside a multi-byte character.
//! - Classify payloads with [`interpret`].
//! - Apply events through a [`SessionController`] bound to a [`RenderTarget`]
//!   and a [`SessionObserver`].
//! - Run a whole stream with [`drive_stream`], optionally cancelled through a
//!   [`CancelSignal`].
//! - Guard a conversation surface against concurrent sends with [`SendGuard`].

pub mod cancel;
pub mod config;
pub mod decoder;
pub mod driver;
pub mod error;
pub mod events;
pub mod guard;
pub mod interpreter;
pub mod logging;
pub mod render;
pub mod session;

pub use crate::cancel::{await_or_cancel, cancel_signal, is_cancelled, CancelSignal};
pub use crate::config::EnvConfig;
pub use crate::decoder::{DecoderTail, FrameDecoder, RawFrame, Utf8StreamDecoder, FRAME_MARKER};
pub use crate::driver::{drive_stream, SessionReport, StreamOutcome};
pub use crate::error::{Cancelled, SessionError};
pub use crate::events::{Completion, ResponseMetrics, StreamEvent};
pub use crate::guard::{SendGuard, SendPermit};
pub use crate::interpreter::{interpret, interpret_payload};
pub use crate::logging::init_logging;
pub use crate::render::{
    Content, ContentFormatter, HtmlBuffer, MarkdownFormatter, PlainTextFormatter, RenderTarget,
    Rendered,
};
pub use crate::session::{
    Anomaly, Applied, ProtocolViolation, SessionController, SessionObserver, SessionState,
    StreamSession, Termination,
};
