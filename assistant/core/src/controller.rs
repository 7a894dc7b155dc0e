//! Stream Controller - Turn Lifecycle
//!
//! The controller drives one [`SessionStore`] against a backend:
//! - checks the single-flight guard and appends the turn
//! - asks the [`AuthProvider`] for a credential before connecting
//! - opens one connection per turn through a [`Connector`]
//! - decodes every frame and routes it to the store
//! - ends the turn on done, error, transport loss, idle timeout or cancel
//!
//! # Design Philosophy
//!
//! Every await point leaves the store consistent, so any in-flight controller
//! future (a `send` waiting on auth, a `step` waiting for a frame) can be
//! dropped and followed by [`StreamController::cancel`]. The controller never
//! returns an error for a failed turn: failures land in the conversation as
//! `Errored` messages and the session stays usable.
//!
//! # Driving the controller
//!
//! ```ignore
//! let target = controller.send("Sales by store last month").await?;
//! controller.run_until_closed().await;
//! ```
//!
//! Embedders with their own loop can call [`StreamController::poll`] instead,
//! which only handles frames that have already arrived.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::auth::AuthProvider;
use crate::content::ErrorOrigin;
use crate::decoder::{FrameDecoder, ProgressLabels};
use crate::events::DecodedEvent;
use crate::messages::{Message, MessageId, SessionId};
use crate::persistence::SessionIdStore;
use crate::session::{ApplyOutcome, ClearRejected, SendRejected, SessionStore, DEFAULT_GREETING};
use crate::transport::{ConnectRequest, Connector, TransportFrame};

/// Shown when the connection drops or cannot be opened
pub const CONNECTION_INTERRUPTED: &str = "Connection to the server was interrupted. Please try again.";

/// Shown when no credential could be obtained
pub const AUTH_FAILED: &str = "Could not sign in to the analytics service. Please sign in again.";

/// Shown when the backend goes quiet for longer than the idle timeout
pub const RESPONSE_TIMED_OUT: &str = "The server stopped responding. Please try again.";

/// Default time to wait for the next frame
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Controller configuration
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Backend chat endpoint
    pub endpoint: String,
    /// Time to wait for the next frame; zero disables the timeout
    pub idle_timeout: Duration,
    /// Stage labels for progress frames
    pub progress_labels: ProgressLabels,
    /// Greeting seeded into new and cleared sessions
    pub greeting: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000/ws/chat".to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            progress_labels: ProgressLabels::builtin(),
            greeting: Some(DEFAULT_GREETING.to_string()),
        }
    }
}

/// Connection lifecycle of the current turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No turn has started in this session
    Idle,
    /// Waiting for a credential or the connection
    Opening,
    /// Frames are being read
    Open,
    /// The last turn ended
    Closed,
}

/// Why a stream ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The backend sent `done`
    Completed,
    /// The backend sent an error frame
    ServerError,
    /// The connection failed, closed early, or could not be opened
    TransportError,
    /// No credential could be obtained
    AuthFailed,
    /// No frame arrived within the idle timeout
    TimedOut,
    /// The user cancelled
    Cancelled,
}

/// Notifications for whoever renders the conversation
#[derive(Clone, Debug)]
pub enum SessionUpdate {
    /// A message was added
    MessageAppended {
        /// Snapshot of the new message
        message: Message,
    },
    /// An assistant message changed state
    MessageUpdated {
        /// Snapshot after the change
        message: Message,
    },
    /// The active stream ended
    StreamClosed {
        /// Message the stream wrote into
        target: MessageId,
        /// Why it ended
        reason: CloseReason,
    },
    /// The session was reset
    SessionCleared {
        /// New session id
        session_id: SessionId,
    },
}

/// What the controller waited for
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// The transport delivered something
    Frame(TransportFrame),
    /// Nothing arrived within the idle timeout
    IdleTimeout,
    /// There is no open connection to read from
    NoStream,
}

/// Drives turns for one session
pub struct StreamController<A: AuthProvider, C: Connector> {
    /// Configuration
    config: ControllerConfig,
    /// The conversation
    store: SessionStore,
    /// Frame decoder
    decoder: FrameDecoder,
    /// Credential source
    auth: A,
    /// Transport
    connector: C,
    /// Where the session id is kept
    persistence: Arc<dyn SessionIdStore>,
    /// Phase of the current turn
    phase: ConnectionPhase,
    /// When the open stream times out; moved forward only by a frame
    deadline: Option<Instant>,
    /// Optional observer channel
    updates: Option<mpsc::Sender<SessionUpdate>>,
}

impl<A: AuthProvider, C: Connector> StreamController<A, C> {
    /// Create a controller over an existing store
    pub fn new(
        store: SessionStore,
        auth: A,
        connector: C,
        persistence: Arc<dyn SessionIdStore>,
        config: ControllerConfig,
    ) -> Self {
        let decoder = FrameDecoder::new(config.progress_labels.clone());
        Self {
            config,
            store,
            decoder,
            auth,
            connector,
            persistence,
            phase: ConnectionPhase::Idle,
            deadline: None,
            updates: None,
        }
    }

    /// Create a controller that continues the persisted session
    ///
    /// Starts a fresh session (and persists its id) when nothing was stored.
    /// Persistence failures are logged and never fatal.
    pub async fn restore(
        auth: A,
        connector: C,
        persistence: Arc<dyn SessionIdStore>,
        config: ControllerConfig,
    ) -> Self {
        let greeting = config.greeting.clone();
        let store = match persistence.load().await {
            Ok(Some(id)) => {
                tracing::info!(session = %id, "Resuming session");
                SessionStore::with_id(id, greeting)
            }
            Ok(None) => {
                let store = SessionStore::new(greeting);
                save_session_id(persistence.as_ref(), store.session_id()).await;
                store
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load session id, starting fresh");
                SessionStore::new(greeting)
            }
        };

        Self::new(store, auth, connector, persistence, config)
    }

    /// Send `SessionUpdate`s to `tx`
    #[must_use]
    pub fn with_updates(mut self, tx: mpsc::Sender<SessionUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    /// The conversation
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Current session id
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.store.session_id()
    }

    /// Phase of the current turn
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Name of the transport in use
    #[must_use]
    pub fn transport_name(&self) -> &str {
        self.connector.name()
    }

    /// Whether a turn is in flight
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.store.has_active_stream()
    }

    /// Start a turn
    ///
    /// Appends the user message and placeholder, obtains a credential and
    /// opens the connection. Auth and connection failures end the turn as an
    /// `Errored` placeholder and still return `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `SendRejected` (creating nothing) while another turn is active
    /// or when `text` is blank.
    pub async fn send(&mut self, text: &str) -> Result<MessageId, SendRejected> {
        let target = match self.store.append_user_message(text) {
            Ok(target) => target,
            Err(rejected) => {
                tracing::debug!(reason = %rejected, "Send rejected");
                return Err(rejected);
            }
        };

        for message in self.store.messages().iter().rev().take(2).rev() {
            self.notify(SessionUpdate::MessageAppended {
                message: message.clone(),
            });
        }

        self.phase = ConnectionPhase::Opening;
        tracing::info!(session = %self.store.session_id(), turn = %target, "Starting turn");

        let credential = match self.auth.refresh_if_needed().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(error = %e, "Credential refresh failed");
                self.fail_turn(&target, ErrorOrigin::Auth, AUTH_FAILED, CloseReason::AuthFailed);
                return Ok(target);
            }
        };

        let request = ConnectRequest {
            endpoint: self.config.endpoint.clone(),
            query: text.to_string(),
            session_id: self.store.session_id().clone(),
            credential,
        };

        match self.connector.connect(&request).await {
            Ok(connection) => {
                let peer = connection.peer().to_string();
                if self.store.attach_transport(&target, connection) {
                    self.phase = ConnectionPhase::Open;
                    let idle_timeout = self.config.idle_timeout;
                    self.deadline = (!idle_timeout.is_zero()).then(|| Instant::now() + idle_timeout);
                    tracing::debug!(
                        transport = self.connector.name(),
                        peer = %peer,
                        "Connection open"
                    );
                    if let Some(user) = self.store.messages().iter().rev().nth(1) {
                        self.notify(SessionUpdate::MessageUpdated {
                            message: user.clone(),
                        });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(transport = self.connector.name(), error = %e, "Connect failed");
                self.fail_turn(
                    &target,
                    ErrorOrigin::Transport,
                    CONNECTION_INTERRUPTED,
                    CloseReason::TransportError,
                );
            }
        }

        Ok(target)
    }

    /// Wait for the next frame of the active stream
    ///
    /// Cancel safe: dropping the future loses no frame and does not push the
    /// idle deadline back. Only an arriving frame does.
    pub async fn next_inbound(&mut self) -> Inbound {
        let idle_timeout = self.config.idle_timeout;
        let Some(connection) = self.store.active_connection_mut() else {
            return Inbound::NoStream;
        };

        if idle_timeout.is_zero() {
            return Inbound::Frame(connection.recv().await);
        }

        let deadline = *self
            .deadline
            .get_or_insert_with(|| Instant::now() + idle_timeout);
        match tokio::time::timeout_at(deadline, connection.recv()).await {
            Ok(frame) => {
                self.deadline = Some(Instant::now() + idle_timeout);
                Inbound::Frame(frame)
            }
            Err(_) => Inbound::IdleTimeout,
        }
    }

    /// Process what [`next_inbound`](Self::next_inbound) returned
    ///
    /// Returns `None` when no stream was active to receive it.
    pub fn handle_inbound(&mut self, inbound: Inbound) -> Option<ApplyOutcome> {
        let Some(target) = self.store.active_target().cloned() else {
            if inbound != Inbound::NoStream {
                tracing::debug!("Inbound after stream ended, discarded");
            }
            return None;
        };

        let outcome = match inbound {
            Inbound::NoStream => return None,
            Inbound::Frame(TransportFrame::Payload(raw)) => {
                let frame = self.decoder.decode(&raw);
                let reason = match &frame.event {
                    DecodedEvent::Done { .. } => CloseReason::Completed,
                    DecodedEvent::Error { .. } => CloseReason::ServerError,
                    _ => CloseReason::TransportError,
                };
                let outcome = self.apply(&target, &frame.event, reason);
                match frame.done {
                    Some(done) if matches!(outcome, ApplyOutcome::Applied | ApplyOutcome::Unchanged) => {
                        self.apply(&target, &done, CloseReason::Completed)
                    }
                    _ => outcome,
                }
            }
            Inbound::Frame(TransportFrame::Closed { reason }) => {
                tracing::warn!(
                    reason = reason.as_deref().unwrap_or("none"),
                    "Connection closed before the response finished"
                );
                self.fail_turn(
                    &target,
                    ErrorOrigin::Transport,
                    CONNECTION_INTERRUPTED,
                    CloseReason::TransportError,
                )
            }
            Inbound::Frame(TransportFrame::Failed(error)) => {
                tracing::warn!(error = %error, "Connection failed mid-stream");
                self.fail_turn(
                    &target,
                    ErrorOrigin::Transport,
                    CONNECTION_INTERRUPTED,
                    CloseReason::TransportError,
                )
            }
            Inbound::IdleTimeout => {
                tracing::warn!(
                    timeout_secs = self.config.idle_timeout.as_secs(),
                    "No frame within idle timeout"
                );
                self.fail_turn(
                    &target,
                    ErrorOrigin::Timeout,
                    RESPONSE_TIMED_OUT,
                    CloseReason::TimedOut,
                )
            }
        };

        Some(outcome)
    }

    /// Wait for one frame and process it
    pub async fn step(&mut self) -> Option<ApplyOutcome> {
        let inbound = self.next_inbound().await;
        self.handle_inbound(inbound)
    }

    /// Process frames until the active stream ends
    pub async fn run_until_closed(&mut self) {
        while self.store.has_open_connection() {
            if self.step().await.is_none() {
                break;
            }
        }
    }

    /// Process frames that have already arrived, without waiting
    ///
    /// Returns `true` if at least one frame was handled.
    pub fn poll(&mut self) -> bool {
        let mut handled = false;
        loop {
            let frame = match self.store.active_connection_mut() {
                Some(connection) => connection.try_recv(),
                None => None,
            };
            let Some(frame) = frame else {
                return handled;
            };
            handled = true;
            self.handle_inbound(Inbound::Frame(frame));
        }
    }

    /// Cancel the turn in flight
    ///
    /// The connection is closed before this returns; nothing that was in
    /// flight is applied afterwards. No-op when nothing is streaming.
    pub fn cancel(&mut self) -> Option<MessageId> {
        let target = self.store.cancel_active()?;
        self.phase = ConnectionPhase::Closed;
        self.notify_message(&target);
        self.notify(SessionUpdate::StreamClosed {
            target: target.clone(),
            reason: CloseReason::Cancelled,
        });
        Some(target)
    }

    /// Reset the conversation and persist the new session id
    ///
    /// # Errors
    ///
    /// Returns `ClearRejected` while a turn is active; cancel it first.
    pub async fn clear(&mut self) -> Result<SessionId, ClearRejected> {
        let session_id = self.store.clear()?;
        self.phase = ConnectionPhase::Idle;
        save_session_id(self.persistence.as_ref(), &session_id).await;

        self.notify(SessionUpdate::SessionCleared {
            session_id: session_id.clone(),
        });
        for message in self.store.messages() {
            self.notify(SessionUpdate::MessageAppended {
                message: message.clone(),
            });
        }
        Ok(session_id)
    }

    fn apply(&mut self, target: &MessageId, event: &DecodedEvent, reason: CloseReason) -> ApplyOutcome {
        let outcome = self.store.apply_event(target, event);
        match outcome {
            ApplyOutcome::Applied => self.notify_message(target),
            ApplyOutcome::Finished => {
                self.phase = ConnectionPhase::Closed;
                self.notify_message(target);
                self.notify(SessionUpdate::StreamClosed {
                    target: target.clone(),
                    reason,
                });
                tracing::info!(turn = %target, reason = ?reason, "Turn finished");
            }
            ApplyOutcome::Unchanged | ApplyOutcome::Ignored => {}
        }
        outcome
    }

    fn fail_turn(
        &mut self,
        target: &MessageId,
        origin: ErrorOrigin,
        message: &str,
        reason: CloseReason,
    ) -> ApplyOutcome {
        let event = DecodedEvent::local_error(origin, message);
        self.apply(target, &event, reason)
    }

    fn notify_message(&self, id: &MessageId) {
        if let Some(message) = self.store.get(id) {
            self.notify(SessionUpdate::MessageUpdated {
                message: message.clone(),
            });
        }
    }

    fn notify(&self, update: SessionUpdate) {
        let Some(tx) = &self.updates else {
            return;
        };
        if let Err(e) = tx.try_send(update) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!("Update channel full, dropping session update");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::trace!("Update receiver gone");
                }
            }
        }
    }
}

async fn save_session_id(persistence: &dyn SessionIdStore, id: &SessionId) {
    if let Err(e) = persistence.save(id).await {
        tracing::warn!(session = %id, error = %e, "Could not persist session id");
    }
}
