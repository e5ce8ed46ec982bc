use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

use chat_api::ChatRequest;
use chat_stream::{cancel_signal, CancelSignal, Completion, SendGuard, SendPermit, SessionObserver};
use tracing::{debug, info};

use crate::commands::{parse_command, ChatCommand};

pub const HELP_TEXT: &str = "Commands: /help, /new, /cancel, /quit";
pub const NOTICE_SEND_IN_FLIGHT: &str = "A response is still streaming; /cancel to stop it";
const NOTICE_NEW_CONVERSATION: &str = "Started a new conversation";
const NOTICE_CANCELLING: &str = "Cancelling response";
const NOTICE_NOTHING_TO_CANCEL: &str = "Nothing to cancel";

/// Conversation id shared between the prompt loop and in-flight sessions.
#[derive(Debug, Clone, Default)]
pub struct ConversationHandle {
    current: Arc<Mutex<Option<String>>>,
}

impl ConversationHandle {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn current(&self) -> Option<String> {
        lock_unpoisoned(&self.current).clone()
    }

    pub fn reset(&self) {
        *lock_unpoisoned(&self.current) = None;
    }
}

impl SessionObserver for ConversationHandle {
    fn on_conversation_id_assigned(&mut self, conversation_id: &str) {
        info!(conversation_id, "conversation started");
        *lock_unpoisoned(&self.current) = Some(conversation_id.to_owned());
    }

    fn on_session_complete(&mut self, completion: &Completion) {
        debug!(
            conversation_id = completion.conversation_id.as_deref(),
            "response complete"
        );
    }
}

/// Everything one admitted send needs; dropping it releases the send guard.
#[derive(Debug)]
pub struct PendingSend {
    pub request: ChatRequest,
    pub cancel: CancelSignal,
    pub observer: ConversationHandle,
    pub permit: SendPermit,
}

#[derive(Debug)]
pub enum Action {
    Send(PendingSend),
    Notice(String),
    Quit,
    Nothing,
}

/// Prompt-loop state: the current conversation and the single send slot.
#[derive(Debug)]
pub struct ChatApp {
    guard: SendGuard,
    conversation: ConversationHandle,
    model: Option<String>,
    active_cancel: Option<CancelSignal>,
}

impl ChatApp {
    pub fn new(conversation_id: Option<String>, model: Option<String>) -> Self {
        Self {
            guard: SendGuard::new(),
            conversation: ConversationHandle::new(conversation_id),
            model,
            active_cancel: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.conversation.current()
    }

    pub fn handle_input(&mut self, line: &str) -> Action {
        if let Some(command) = parse_command(line) {
            return self.handle_command(command);
        }

        let message = line.trim();
        if message.is_empty() {
            return Action::Nothing;
        }

        let Some(permit) = self.guard.try_acquire() else {
            return Action::Notice(NOTICE_SEND_IN_FLIGHT.to_string());
        };

        let mut request = ChatRequest::new(message);
        if let Some(conversation_id) = self.conversation.current() {
            request = request.with_conversation_id(conversation_id);
        }
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let cancel = cancel_signal();
        self.active_cancel = Some(Arc::clone(&cancel));

        Action::Send(PendingSend {
            request,
            cancel,
            observer: self.conversation.clone(),
            permit,
        })
    }

    /// Raise the cancel signal of the in-flight send, if there is one.
    pub fn cancel_active(&mut self) -> bool {
        if !self.guard.is_busy() {
            self.active_cancel = None;
            return false;
        }
        match &self.active_cancel {
            Some(cancel) => {
                cancel.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    fn handle_command(&mut self, command: ChatCommand) -> Action {
        match command {
            ChatCommand::Help => Action::Notice(HELP_TEXT.to_string()),
            ChatCommand::New => {
                if self.guard.is_busy() {
                    return Action::Notice(NOTICE_SEND_IN_FLIGHT.to_string());
                }
                self.conversation.reset();
                Action::Notice(NOTICE_NEW_CONVERSATION.to_string())
            }
            ChatCommand::Cancel => {
                if self.cancel_active() {
                    Action::Notice(NOTICE_CANCELLING.to_string())
                } else {
                    Action::Notice(NOTICE_NOTHING_TO_CANCEL.to_string())
                }
            }
            ChatCommand::Quit => {
                self.cancel_active();
                Action::Quit
            }
            ChatCommand::Unknown(command) => {
                Action::Notice(format!("Unknown command: {command}. {HELP_TEXT}"))
            }
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
