//! Conversation Messages
//!
//! Identifiers and the message record kept by the [`SessionStore`].
//!
//! # Design Philosophy
//!
//! User messages are written once and never edited. Assistant messages carry a
//! [`ContentState`] that only the reducer may advance, so a surface rendering
//! the history can treat every message as a snapshot of one state machine.
//!
//! [`SessionStore`]: crate::session::SessionStore

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentState;

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session identifier
///
/// Sent to the backend with every turn so it can keep server-side context.
/// Persisted across restarts through a [`SessionIdStore`].
///
/// [`SessionIdStore`]: crate::persistence::SessionIdStore
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random session ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// The analytics assistant
    Assistant,
    /// Local notice (never produced by the stream)
    System,
}

/// What a message holds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Fixed text (user and system messages)
    Text(String),
    /// Reducer-owned state (assistant messages)
    Assistant(ContentState),
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// When the message was created
    pub created_at: DateTime<Utc>,
    /// Set on user messages until the backend accepts the turn
    pub optimistic: bool,
    content: MessageContent,
}

impl Message {
    /// Create an optimistic user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::User,
            created_at: Utc::now(),
            optimistic: true,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create an assistant message in the given state
    pub fn assistant(state: ContentState) -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::Assistant,
            created_at: Utc::now(),
            optimistic: false,
            content: MessageContent::Assistant(state),
        }
    }

    /// Create the placeholder an assistant turn streams into
    pub fn placeholder() -> Self {
        Self::assistant(ContentState::thinking())
    }

    /// Message content
    #[must_use]
    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Text of a user or system message
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Assistant(_) => None,
        }
    }

    /// Content state of an assistant message
    #[must_use]
    pub fn state(&self) -> Option<&ContentState> {
        match &self.content {
            MessageContent::Assistant(state) => Some(state),
            MessageContent::Text(_) => None,
        }
    }

    /// Whether this message can still change
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_some_and(|s| !s.is_terminal())
    }

    /// Swap the content state of an assistant message
    ///
    /// Only the session store calls this, always with a state produced by the
    /// reducer. Returns `false` for user and system messages.
    pub(crate) fn replace_state(&mut self, next: ContentState) -> bool {
        match &mut self.content {
            MessageContent::Assistant(state) => {
                *state = next;
                true
            }
            MessageContent::Text(_) => false,
        }
    }
}
