//! The shared conversation transcript and code buffer.
//!
//! Handlers report results (and their own failures) by appending assistant
//! messages here. Both handles are cheap to clone and safe to use from
//! spawned handler tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Author {
    Assistant,
    User,
}

/// What a message's action button leads to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionTarget {
    /// Details view of a running container, by id.
    Container(String),
}

/// A follow-up action attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAction {
    /// Button label.
    pub text: String,
    pub target: ActionTarget,
}

/// Message body, before it is stamped with author and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub action: Option<MessageAction>,
}

impl Message {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            action: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: MessageAction) -> Self {
        self.action = Some(action);
        self
    }
}

impl From<&str> for Message {
    fn from(content: &str) -> Self {
        Self::new(content)
    }
}

impl From<String> for Message {
    fn from(content: String) -> Self {
        Self::new(content)
    }
}

/// A message as stored in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampedMessage {
    pub author: Author,
    pub content: String,
    pub action: Option<MessageAction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TranscriptState {
    messages: Vec<TimestampedMessage>,
    writing: Option<Author>,
}

/// Shared, append-only conversation log.
#[derive(Debug, Clone)]
pub struct Transcript {
    assistant_name: Arc<str>,
    user_name: Arc<str>,
    state: Arc<Mutex<TranscriptState>>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new("Assistant", "You")
    }
}

impl Transcript {
    pub fn new(assistant_name: &str, user_name: &str) -> Self {
        Self {
            assistant_name: Arc::from(assistant_name),
            user_name: Arc::from(user_name),
            state: Arc::new(Mutex::new(TranscriptState::default())),
        }
    }

    /// Append a message from the assistant.
    pub fn push_assistant(&self, message: impl Into<Message>) {
        self.push(Author::Assistant, message.into());
    }

    /// Append a message from the user.
    pub fn push_user(&self, message: impl Into<Message>) {
        self.push(Author::User, message.into());
    }

    fn push(&self, author: Author, message: Message) {
        let entry = TimestampedMessage {
            author,
            content: message.content,
            action: message.action,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages
            .push(entry);
    }

    /// Snapshot of every message so far.
    pub fn messages(&self) -> Vec<TimestampedMessage> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages
            .clone()
    }

    /// Messages appended at or after position `start`.
    pub fn messages_since(&self, start: usize) -> Vec<TimestampedMessage> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.messages.get(start..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// Content of the most recent assistant message.
    pub fn last_assistant(&self) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .messages
            .iter()
            .rev()
            .find(|m| m.author == Author::Assistant)
            .map(|m| m.content.clone())
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark `author` as currently composing a message.
    pub fn set_writing(&self, author: Author) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).writing = Some(author);
    }

    pub fn clear_writing(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).writing = None;
    }

    /// Who is currently composing, if anyone.
    pub fn writing(&self) -> Option<Author> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).writing
    }

    /// Display name for `author`.
    pub fn display_name(&self, author: Author) -> &str {
        match author {
            Author::Assistant => &self.assistant_name,
            Author::User => &self.user_name,
        }
    }
}

/// The code the edit fallback operates on (the generated Dockerfile).
#[derive(Debug, Clone, Default)]
pub struct CodeBuffer {
    code: Arc<Mutex<String>>,
}

impl CodeBuffer {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Arc::new(Mutex::new(code.into())),
        }
    }

    pub fn get(&self) -> String {
        self.code.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, code: impl Into<String>) {
        *self.code.lock().unwrap_or_else(|e| e.into_inner()) = code.into();
    }
}
