//! Drives one chunk stream through decoder, interpreter and controller.

use std::fmt::Display;

use futures_util::{pin_mut, Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::cancel::{await_or_cancel, is_cancelled, CancelSignal};
use crate::decoder::FrameDecoder;
use crate::error::SessionError;
use crate::events::Completion;
use crate::interpreter::interpret;
use crate::render::RenderTarget;
use crate::session::{SessionController, SessionObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    Completed,
    /// The transport closed cleanly before a completion frame arrived.
    EndedWithoutCompletion,
}

/// Summary of a session that reached end-of-stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub outcome: StreamOutcome,
    pub conversation_id: Option<String>,
    pub text: String,
    pub completion: Option<Completion>,
    pub frames: usize,
    pub malformed: usize,
    pub violations: usize,
}

/// Consume `chunks` until end-of-stream, applying every frame in arrival order.
///
/// Frames that arrive after the completion frame are still drained and
/// reported as protocol violations. A transport error fails the session; a
/// raised `cancel` abandons it without touching the render target again.
pub async fn drive_stream<S, B, E, R, O>(
    chunks: S,
    controller: &mut SessionController<R, O>,
    cancel: Option<&CancelSignal>,
) -> Result<SessionReport, SessionError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    R: RenderTarget,
    O: SessionObserver,
{
    pin_mut!(chunks);
    let mut decoder = FrameDecoder::default();
    let mut frames = 0usize;

    loop {
        let next = match await_or_cancel(chunks.next(), cancel).await {
            Ok(next) => next,
            Err(cancelled) => {
                controller.abandon();
                return Err(cancelled.into());
            }
        };
        let Some(chunk) = next else {
            break;
        };
        if is_cancelled(cancel) {
            controller.abandon();
            return Err(SessionError::Cancelled);
        }

        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                let error = SessionError::transport(error);
                controller.fail(&error.to_string());
                return Err(error);
            }
        };

        for frame in decoder.feed(chunk.as_ref()) {
            frames += 1;
            controller.apply(interpret(&frame));
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        debug!(
            residual = %tail.residual,
            partial_bytes = tail.partial_bytes,
            "discarding unterminated stream tail"
        );
    }

    let session = controller.session();
    let outcome = if session.completion().is_some() {
        StreamOutcome::Completed
    } else {
        debug!("stream ended without a completion frame");
        StreamOutcome::EndedWithoutCompletion
    };

    Ok(SessionReport {
        outcome,
        conversation_id: session.conversation_id().map(str::to_owned),
        text: session.accumulated_text().to_owned(),
        completion: session.completion().cloned(),
        frames,
        malformed: session.malformed_frames(),
        violations: session.protocol_violations(),
    })
}
