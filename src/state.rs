//! UI-agnostic chat state.
//!
//! The transcript, pending flag and error live in [`ChatState`], which only
//! changes through [`ChatState::update`]. Side effects (sending a request,
//! cancelling one) come back as a [`Command`] for the host to carry out, so
//! the TUI and the one-shot CLI share the same transitions.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::stream::StreamEvent;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Identifies one accepted submission. Stream updates carry it so that
/// updates from a superseded submission can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

/// A request the host should send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: SubmissionId,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetInput(String),
    Submit,
    Stream { id: SubmissionId, event: StreamEvent },
    Reset,
}

/// Side effect requested by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(Submission),
    Cancel(SubmissionId),
}

#[derive(Debug, Default)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    input: String,
    error: Option<ChatError>,
    active: Option<SubmissionId>,
    next_id: u64,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> Option<&ChatError> {
        self.error.as_ref()
    }

    /// True while a submission is in flight.
    pub fn is_pending(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_submission(&self) -> Option<SubmissionId> {
        self.active
    }

    /// Content of the last assistant message, if the transcript ends with one.
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn update(&mut self, action: Action) -> Option<Command> {
        match action {
            Action::SetInput(input) => {
                self.input = input;
                None
            }
            Action::Submit => self.submit(),
            Action::Stream { id, event } => {
                self.apply_stream(id, event);
                None
            }
            Action::Reset => self.reset(),
        }
    }

    fn submit(&mut self) -> Option<Command> {
        if self.is_pending() {
            tracing::debug!("submit ignored while a request is pending");
            return None;
        }

        self.error = None;
        if self.input.trim().is_empty() {
            self.error = Some(ChatError::EmptyInput);
            return None;
        }

        let input = std::mem::take(&mut self.input);
        self.messages.push(ChatMessage::user(input.clone()));

        self.next_id += 1;
        let id = SubmissionId(self.next_id);
        self.active = Some(id);
        tracing::debug!(submission = id.0, "submission accepted");

        Some(Command::Send(Submission { id, input }))
    }

    fn apply_stream(&mut self, id: SubmissionId, event: StreamEvent) {
        if self.active != Some(id) {
            tracing::debug!(submission = id.0, "dropping update from stale submission");
            return;
        }

        match event {
            StreamEvent::Opened => {
                self.messages.push(ChatMessage::assistant(""));
            }
            StreamEvent::Content(content) => {
                if let Some(last) = self.messages.last_mut() {
                    if last.role == ChatRole::Assistant {
                        last.content = content;
                    }
                }
            }
            StreamEvent::Finished => {
                tracing::debug!(submission = id.0, "submission finished");
                self.active = None;
            }
            StreamEvent::Failed(err) => {
                tracing::warn!(submission = id.0, error = %err, "submission failed");
                self.error = Some(err);
                self.active = None;
            }
        }
    }

    fn reset(&mut self) -> Option<Command> {
        self.messages.clear();
        self.input.clear();
        self.error = None;
        self.active.take().map(Command::Cancel)
    }
}
