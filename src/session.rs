//! Per-request session state and the controller that applies events to it.
//!
//! Invariants held by [`SessionController`]:
//! - events are applied strictly in the order they are handed in;
//! - the accumulated text only ever grows;
//! - the conversation id moves from unset to set at most once;
//! - after termination neither the session nor the render target is touched.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{Completion, StreamEvent};
use crate::render::{Content, ContentFormatter, MarkdownFormatter, RenderTarget};

/// Why a session stopped accepting events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Completed,
    Failed,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Terminated(Termination),
}

/// Mutable state of one in-flight streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSession {
    conversation_id: Option<String>,
    accumulated_text: String,
    state: SessionState,
    completion: Option<Completion>,
    deltas: usize,
    malformed: usize,
    violations: usize,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self {
            conversation_id: None,
            accumulated_text: String::new(),
            state: SessionState::Open,
            completion: None,
            deltas: 0,
            malformed: 0,
            violations: 0,
        }
    }
}

impl StreamSession {
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, SessionState::Terminated(_))
    }

    pub fn termination(&self) -> Option<Termination> {
        match self.state {
            SessionState::Open => None,
            SessionState::Terminated(termination) => Some(termination),
        }
    }

    /// The applied completion frame, if the session finished normally.
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn deltas_applied(&self) -> usize {
        self.deltas
    }

    pub fn malformed_frames(&self) -> usize {
        self.malformed
    }

    pub fn protocol_violations(&self) -> usize {
        self.violations
    }
}

/// Server behavior that is tolerated but not honored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("completion received after the session already completed")]
    DuplicateCompletion,

    #[error("event received after the session terminated")]
    EventAfterTermination,

    #[error("conversation id {ignored:?} conflicts with adopted id {kept:?}")]
    ConflictingConversationId { kept: String, ignored: String },
}

/// Non-fatal irregularity absorbed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    Decode { raw: String },
    Protocol(ProtocolViolation),
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Rendered,
    Completed,
    Ignored(Anomaly),
}

/// External collaborators notified on session milestones.
pub trait SessionObserver {
    /// Called once, when a session without an id adopts one from the stream.
    fn on_conversation_id_assigned(&mut self, conversation_id: &str) {
        let _ = conversation_id;
    }

    /// Called once, after the completion frame has been rendered.
    fn on_session_complete(&mut self, completion: &Completion) {
        let _ = completion;
    }
}

impl SessionObserver for () {}

impl<T: SessionObserver + ?Sized> SessionObserver for &mut T {
    fn on_conversation_id_assigned(&mut self, conversation_id: &str) {
        (**self).on_conversation_id_assigned(conversation_id);
    }

    fn on_session_complete(&mut self, completion: &Completion) {
        (**self).on_session_complete(completion);
    }
}

/// Owns one [`StreamSession`] and drives its render target.
pub struct SessionController<R, O = ()> {
    session: StreamSession,
    target: R,
    observer: O,
    formatter: Box<dyn ContentFormatter>,
}

impl<R, O> SessionController<R, O>
where
    R: RenderTarget,
    O: SessionObserver,
{
    pub fn new(target: R, observer: O) -> Self {
        Self {
            session: StreamSession::default(),
            target,
            observer,
            formatter: Box::new(MarkdownFormatter),
        }
    }

    pub fn with_formatter(mut self, formatter: impl ContentFormatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    /// Continue a conversation whose id is already known; no adoption will happen.
    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        let conversation_id = conversation_id.into();
        if !conversation_id.is_empty() {
            self.session.conversation_id = Some(conversation_id);
        }
        self
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    pub fn target(&self) -> &R {
        &self.target
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_parts(self) -> (StreamSession, R, O) {
        (self.session, self.target, self.observer)
    }

    pub fn apply(&mut self, event: StreamEvent) -> Applied {
        if let SessionState::Terminated(termination) = self.session.state {
            return self.reject_after_termination(termination, &event);
        }

        match event {
            StreamEvent::ContentDelta {
                text,
                conversation_id,
            } => {
                self.adopt_conversation_id(conversation_id.as_deref());
                self.session.accumulated_text.push_str(&text);
                self.session.deltas += 1;

                let rendered = self.formatter.format(&self.session.accumulated_text);
                self.target.set_content(rendered.as_content());
                Applied::Rendered
            }
            StreamEvent::Completion(completion) => {
                self.adopt_conversation_id(completion.conversation_id.as_deref());

                if let Some(html) = completion.html_final_text.as_deref() {
                    self.target.set_content(Content::Html(html));
                }
                if !completion.metrics.is_empty() {
                    self.target.annotate_metrics(&completion.metrics);
                }

                self.session.state = SessionState::Terminated(Termination::Completed);
                info!(
                    conversation_id = self.session.conversation_id.as_deref().unwrap_or(""),
                    deltas = self.session.deltas,
                    chars = self.session.accumulated_text.chars().count(),
                    "stream session completed"
                );
                self.observer.on_session_complete(&completion);
                self.session.completion = Some(completion);
                Applied::Completed
            }
            StreamEvent::Malformed { raw } => {
                self.session.malformed += 1;
                debug!(raw = %raw, "ignoring malformed frame");
                Applied::Ignored(Anomaly::Decode { raw })
            }
        }
    }

    /// Mark the session failed after a transport error. The render target is left as is.
    pub fn fail(&mut self, reason: &str) {
        if self.session.is_terminated() {
            return;
        }
        warn!(reason, "stream session failed");
        self.session.state = SessionState::Terminated(Termination::Failed);
    }

    /// Abandon the session. The render target may already be gone and is not touched.
    pub fn abandon(&mut self) {
        if self.session.is_terminated() {
            return;
        }
        debug!("stream session abandoned");
        self.session.state = SessionState::Terminated(Termination::Abandoned);
    }

    fn adopt_conversation_id(&mut self, candidate: Option<&str>) {
        let Some(candidate) = candidate.filter(|value| !value.is_empty()) else {
            return;
        };

        match self.session.conversation_id.as_deref() {
            None => {
                info!(conversation_id = candidate, "conversation id assigned");
                self.session.conversation_id = Some(candidate.to_owned());
                self.observer.on_conversation_id_assigned(candidate);
            }
            Some(kept) if kept != candidate => {
                let violation = ProtocolViolation::ConflictingConversationId {
                    kept: kept.to_owned(),
                    ignored: candidate.to_owned(),
                };
                warn!(%violation, "keeping adopted conversation id");
                self.session.violations += 1;
            }
            Some(_) => {}
        }
    }

    fn reject_after_termination(
        &mut self,
        termination: Termination,
        event: &StreamEvent,
    ) -> Applied {
        let violation = match (termination, event) {
            (Termination::Completed, StreamEvent::Completion(_)) => {
                ProtocolViolation::DuplicateCompletion
            }
            _ => ProtocolViolation::EventAfterTermination,
        };
        if termination == Termination::Completed {
            warn!(%violation, "ignoring frame");
        } else {
            debug!(%violation, ?termination, "ignoring frame");
        }
        self.session.violations += 1;
        Applied::Ignored(Anomaly::Protocol(violation))
    }
}

impl<R, O> std::fmt::Debug for SessionController<R, O>
where
    R: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Anomaly, Applied, ProtocolViolation, SessionController, SessionObserver, SessionState,
        Termination,
    };
    use crate::events::{Completion, ResponseMetrics, StreamEvent};
    use crate::render::{HtmlBuffer, PlainTextFormatter};

    #[derive(Debug, Default)]
    struct Recorder {
        assigned: Vec<String>,
        completed: usize,
    }

    impl SessionObserver for Recorder {
        fn on_conversation_id_assigned(&mut self, conversation_id: &str) {
            self.assigned.push(conversation_id.to_owned());
        }

        fn on_session_complete(&mut self, _completion: &Completion) {
            self.completed += 1;
        }
    }

    fn controller() -> SessionController<HtmlBuffer, Recorder> {
        SessionController::new(HtmlBuffer::new(), Recorder::default())
    }

    fn delta_with_id(text: &str, id: &str) -> StreamEvent {
        StreamEvent::ContentDelta {
            text: text.to_owned(),
            conversation_id: Some(id.to_owned()),
        }
    }

    #[test]
    fn deltas_rerender_the_whole_accumulation() {
        let mut controller = controller();
        assert_eq!(controller.apply(StreamEvent::delta("**He")), Applied::Rendered);
        assert_eq!(controller.apply(StreamEvent::delta("llo**")), Applied::Rendered);

        assert_eq!(controller.session().accumulated_text(), "**Hello**");
        assert_eq!(
            controller.target().content(),
            "<p><strong>Hello</strong></p>"
        );
        assert_eq!(controller.target().writes(), 2);
    }

    #[test]
    fn plain_formatter_writes_text_content() {
        let mut controller = controller().with_formatter(PlainTextFormatter);
        controller.apply(StreamEvent::delta("a"));
        controller.apply(StreamEvent::delta("b"));
        assert_eq!(controller.target().content(), "ab");
        assert!(!controller.target().is_html());
    }

    #[test]
    fn conversation_id_is_adopted_once_and_never_replaced() {
        let mut controller = controller();
        controller.apply(StreamEvent::delta("x"));
        controller.apply(delta_with_id("y", "c1"));
        controller.apply(delta_with_id("z", "c2"));
        controller.apply(StreamEvent::Completion(Completion {
            conversation_id: Some("c3".to_owned()),
            ..Completion::default()
        }));

        assert_eq!(controller.session().conversation_id(), Some("c1"));
        assert_eq!(controller.observer().assigned, vec!["c1".to_owned()]);
        assert_eq!(controller.session().protocol_violations(), 2);
    }

    #[test]
    fn known_conversation_id_suppresses_adoption() {
        let mut controller = controller().with_conversation_id("existing");
        controller.apply(delta_with_id("x", "existing"));
        assert_eq!(controller.session().conversation_id(), Some("existing"));
        assert!(controller.observer().assigned.is_empty());
        assert_eq!(controller.session().protocol_violations(), 0);
    }

    #[test]
    fn completion_html_is_authoritative_and_metrics_annotated() {
        let mut controller = controller();
        controller.apply(StreamEvent::delta("draft"));
        let applied = controller.apply(StreamEvent::Completion(Completion {
            html_final_text: Some("<p>final</p>".to_owned()),
            metrics: ResponseMetrics {
                tokens_per_second: Some(8.0),
                ..ResponseMetrics::default()
            },
            ..Completion::default()
        }));

        assert_eq!(applied, Applied::Completed);
        assert_eq!(controller.target().content(), "<p>final</p>");
        assert_eq!(
            controller.target().metrics().and_then(|m| m.tokens_per_second),
            Some(8.0)
        );
        assert_eq!(controller.observer().completed, 1);
        assert_eq!(
            controller.session().state(),
            SessionState::Terminated(Termination::Completed)
        );
        assert_eq!(controller.session().accumulated_text(), "draft");
    }

    #[test]
    fn completion_without_html_keeps_local_render() {
        let mut controller = controller();
        controller.apply(StreamEvent::delta("local"));
        controller.apply(StreamEvent::Completion(Completion::default()));
        assert_eq!(controller.target().content(), "<p>local</p>");
        assert!(controller.target().metrics().is_none());
    }

    #[test]
    fn events_after_completion_are_ignored() {
        let mut controller = controller();
        controller.apply(StreamEvent::Completion(Completion::default()));
        let writes = controller.target().writes();

        assert_eq!(
            controller.apply(StreamEvent::Completion(Completion::default())),
            Applied::Ignored(Anomaly::Protocol(ProtocolViolation::DuplicateCompletion))
        );
        assert_eq!(
            controller.apply(StreamEvent::delta("late")),
            Applied::Ignored(Anomaly::Protocol(ProtocolViolation::EventAfterTermination))
        );
        assert_eq!(controller.session().accumulated_text(), "");
        assert_eq!(controller.target().writes(), writes);
        assert_eq!(controller.observer().completed, 1);
    }

    #[test]
    fn malformed_frames_leave_state_untouched() {
        let mut controller = controller();
        controller.apply(StreamEvent::delta("ok"));
        let before = controller.session().clone();

        let applied = controller.apply(StreamEvent::malformed("not-json"));
        assert_eq!(
            applied,
            Applied::Ignored(Anomaly::Decode {
                raw: "not-json".to_owned()
            })
        );
        assert_eq!(controller.session().accumulated_text(), before.accumulated_text());
        assert_eq!(controller.session().state(), SessionState::Open);
        assert_eq!(controller.session().malformed_frames(), 1);
        assert_eq!(controller.target().writes(), 1);
    }

    #[test]
    fn abandoned_session_never_touches_target() {
        let mut controller = controller();
        controller.apply(StreamEvent::delta("a"));
        controller.abandon();
        controller.apply(StreamEvent::delta("b"));
        controller.apply(StreamEvent::Completion(Completion {
            html_final_text: Some("<p>x</p>".to_owned()),
            ..Completion::default()
        }));

        assert_eq!(controller.target().writes(), 1);
        assert_eq!(controller.session().termination(), Some(Termination::Abandoned));
        assert_eq!(controller.observer().completed, 0);
    }

    #[test]
    fn fail_is_a_no_op_once_terminated() {
        let mut controller = controller();
        controller.apply(StreamEvent::Completion(Completion::default()));
        controller.fail("late network error");
        assert_eq!(controller.session().termination(), Some(Termination::Completed));
    }
}
