//! Session Management
//!
//! The [`SessionStore`] owns one conversation: its id, the ordered message
//! history, and at most one active stream.
//!
//! # Design Philosophy
//!
//! The store is the only place that mutates messages and the only holder of
//! an open [`Connection`]. Every operation is synchronous and takes
//! `&mut self`, so a single owner processes one frame at a time and the
//! invariants below can be checked after every call:
//!
//! - at most one active stream per session
//! - while a stream is active, the last message is its open assistant message
//! - a message in a terminal state never changes again
//!
//! When the streamed message reaches a terminal state, the store releases the
//! stream (closing its connection) in the same call.

use crate::content::{ContentState, FinalContent};
use crate::events::DecodedEvent;
use crate::messages::{Message, MessageId, MessageRole, SessionId};
use crate::reducer;
use crate::transport::Connection;

/// Greeting seeded into a fresh or cleared session
pub const DEFAULT_GREETING: &str =
    "Hi! Ask me about sales, inventory or customers and I'll dig into the data.";

/// Response id given to seeded greeting messages
const GREETING_RESPONSE_ID: &str = "greeting";

/// Why a send was refused
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendRejected {
    /// A response is still streaming
    #[error("a response is already streaming into {target}")]
    StreamActive {
        /// Message the active stream writes into
        target: MessageId,
    },
    /// Nothing to send
    #[error("message is empty")]
    EmptyMessage,
}

/// Why a clear was refused
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot clear while a response is streaming into {target}; cancel it first")]
pub struct ClearRejected {
    /// Message the active stream writes into
    pub target: MessageId,
}

/// Result of applying one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The message advanced and is still open
    Applied,
    /// The message reached a terminal state; its stream was released
    Finished,
    /// The event did not change the message
    Unchanged,
    /// The event was discarded as a protocol anomaly
    Ignored,
}

/// The one stream a session may have open
#[derive(Debug)]
struct ActiveStream {
    target: MessageId,
    connection: Option<Connection>,
}

/// A conversation and its single streaming slot
#[derive(Debug)]
pub struct SessionStore {
    id: SessionId,
    messages: Vec<Message>,
    active: Option<ActiveStream>,
    greeting: Option<String>,
    anomalies: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Some(DEFAULT_GREETING.to_string()))
    }
}

impl SessionStore {
    /// Create a session with a fresh id
    ///
    /// `greeting` is seeded as the first assistant message; `None` starts
    /// empty.
    pub fn new(greeting: Option<String>) -> Self {
        Self::with_id(SessionId::new(), greeting)
    }

    /// Create a session that continues an existing id
    pub fn with_id(id: SessionId, greeting: Option<String>) -> Self {
        let mut store = Self {
            id,
            messages: Vec::new(),
            active: None,
            greeting,
            anomalies: 0,
        };
        store.seed();
        store
    }

    /// Session identifier sent with every turn
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    /// Messages in conversation order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Most recent message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Message the active stream writes into
    #[must_use]
    pub fn active_target(&self) -> Option<&MessageId> {
        self.active.as_ref().map(|a| &a.target)
    }

    /// Whether a stream is active
    #[must_use]
    pub fn has_active_stream(&self) -> bool {
        self.active.is_some()
    }

    /// Whether the active stream has a connection attached
    #[must_use]
    pub fn has_open_connection(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.connection.is_some())
    }

    /// Protocol anomalies seen so far
    #[must_use]
    pub fn anomaly_count(&self) -> u64 {
        self.anomalies
    }

    /// Append the user's message and an assistant placeholder
    ///
    /// Returns the placeholder's id; the placeholder becomes the active
    /// stream's target.
    ///
    /// # Errors
    ///
    /// Refused without creating any message while a stream is active or when
    /// `text` is blank.
    pub fn append_user_message(&mut self, text: &str) -> Result<MessageId, SendRejected> {
        if let Some(active) = &self.active {
            return Err(SendRejected::StreamActive {
                target: active.target.clone(),
            });
        }
        if text.trim().is_empty() {
            return Err(SendRejected::EmptyMessage);
        }

        self.messages.push(Message::user(text));
        let placeholder = Message::placeholder();
        let target = placeholder.id.clone();
        self.messages.push(placeholder);
        self.active = Some(ActiveStream {
            target: target.clone(),
            connection: None,
        });

        tracing::debug!(session = %self.id, turn = %target, "Turn started");
        Ok(target)
    }

    /// Hand the store the connection for the active stream
    ///
    /// Returns `false` (and closes `connection`) if `target` is no longer the
    /// active stream, e.g. because the turn was cancelled while connecting.
    /// On success the user message of the turn stops being optimistic.
    #[must_use]
    pub fn attach_transport(&mut self, target: &MessageId, mut connection: Connection) -> bool {
        let Some(active) = self.active.as_mut().filter(|a| &a.target == target) else {
            tracing::debug!(turn = %target, peer = connection.peer(), "Stale connection closed");
            connection.close();
            return false;
        };

        if let Some(mut previous) = active.connection.replace(connection) {
            previous.close();
        }

        if let Some(user) = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == MessageRole::User)
        {
            user.optimistic = false;
        }
        true
    }

    /// The active stream's connection, for reading frames
    pub(crate) fn active_connection_mut(&mut self) -> Option<&mut Connection> {
        self.active.as_mut().and_then(|a| a.connection.as_mut())
    }

    /// Apply one decoded event to an assistant message
    ///
    /// Events for unknown, non-assistant or terminal messages, and malformed
    /// events, are logged and counted as anomalies and otherwise ignored.
    pub fn apply_event(&mut self, id: &MessageId, event: &DecodedEvent) -> ApplyOutcome {
        if let DecodedEvent::Malformed { raw, reason } = event {
            self.record_anomaly(id, &format!("malformed frame ({reason}): {}", preview(raw)));
            return ApplyOutcome::Ignored;
        }

        let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) else {
            self.record_anomaly(id, &format!("{} event for unknown message", event.kind()));
            return ApplyOutcome::Ignored;
        };
        let Some(state) = message.state() else {
            self.record_anomaly(id, &format!("{} event for non-assistant message", event.kind()));
            return ApplyOutcome::Ignored;
        };
        if state.is_terminal() {
            let kind = state.kind();
            self.record_anomaly(id, &format!("{} event after terminal {kind}", event.kind()));
            return ApplyOutcome::Ignored;
        }

        let next = reducer::reduce(state.clone(), event);
        if next == *state {
            tracing::debug!(message_id = %id, event = event.kind(), "Event left message unchanged");
            return ApplyOutcome::Unchanged;
        }

        tracing::debug!(message_id = %id, from = state.kind(), to = next.kind(), "Message advanced");
        let terminal = next.is_terminal();
        message.replace_state(next);

        if !terminal {
            return ApplyOutcome::Applied;
        }
        if self.active_target() == Some(id) {
            self.release();
        }
        ApplyOutcome::Finished
    }

    /// Cancel the active stream
    ///
    /// Closes the connection before returning, marks the target `Cancelled`
    /// with whatever had arrived, and clears the active stream. Returns the
    /// cancelled message id, or `None` when nothing was streaming.
    pub fn cancel_active(&mut self) -> Option<MessageId> {
        let target = self.release()?;

        if let Some(message) = self.messages.iter_mut().find(|m| m.id == target) {
            if let Some(state) = message.state() {
                let cancelled = reducer::cancel(state.clone());
                message.replace_state(cancelled);
            }
        }

        tracing::info!(session = %self.id, turn = %target, "Turn cancelled");
        Some(target)
    }

    /// Reset to the greeting with a fresh session id
    ///
    /// # Errors
    ///
    /// Refused while a stream is active.
    pub fn clear(&mut self) -> Result<SessionId, ClearRejected> {
        if let Some(active) = &self.active {
            return Err(ClearRejected {
                target: active.target.clone(),
            });
        }

        self.id = SessionId::new();
        self.messages.clear();
        self.seed();

        tracing::info!(session = %self.id, "Session cleared");
        Ok(self.id.clone())
    }

    /// Close the connection and drop the active stream
    fn release(&mut self) -> Option<MessageId> {
        let mut active = self.active.take()?;
        if let Some(connection) = active.connection.as_mut() {
            connection.close();
            tracing::debug!(
                peer = connection.peer(),
                frames = connection.frames_received(),
                age_ms = u64::try_from(connection.age().as_millis()).unwrap_or(u64::MAX),
                "Connection released"
            );
        }
        Some(active.target)
    }

    fn seed(&mut self) {
        if let Some(greeting) = &self.greeting {
            self.messages.push(Message::assistant(ContentState::Complete {
                final_content: FinalContent::Answer {
                    text: greeting.clone(),
                    thinking_steps: Vec::new(),
                },
                response_id: GREETING_RESPONSE_ID.to_string(),
            }));
        }
    }

    fn record_anomaly(&mut self, id: &MessageId, what: &str) {
        self.anomalies += 1;
        tracing::warn!(
            session = %self.id,
            message_id = %id,
            anomalies = self.anomalies,
            "Protocol anomaly: {what}"
        );
    }
}

/// First 80 characters of a raw frame, for logs
fn preview(raw: &str) -> String {
    const LIMIT: usize = 80;
    match raw.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}
