//! Transport Traits
//!
//! The connection seam between the [`StreamController`] and the network.
//!
//! A [`Connector`] opens one receive-only connection per turn and hands back a
//! [`Connection`]: a handle over a channel that a transport-owned reader task
//! feeds with [`TransportFrame`]s. Closing the handle closes the channel; the
//! reader task sees that and shuts the underlying socket down.
//!
//! [`StreamController`]: crate::controller::StreamController

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::auth::Credential;
use crate::messages::SessionId;

/// Errors that can occur while opening or reading a connection
#[derive(Debug)]
pub enum TransportError {
    /// Endpoint URL could not be built
    InvalidEndpoint(String),
    /// Connection to the backend failed
    ConnectionFailed(String),
    /// Connection was closed
    ConnectionClosed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint(msg) => write!(f, "Invalid endpoint: {msg}"),
            Self::ConnectionFailed(msg) => write!(f, "Connection failed: {msg}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Parameters for one turn's connection
#[derive(Clone, Debug)]
pub struct ConnectRequest {
    /// Backend endpoint (without query string)
    pub endpoint: String,
    /// The user's question
    pub query: String,
    /// Conversation the turn belongs to
    pub session_id: SessionId,
    /// Freshly validated access credential
    pub credential: Credential,
}

impl ConnectRequest {
    /// Endpoint URL with `query`, `session_id` and `token` parameters
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidEndpoint` if the endpoint is not a URL.
    pub fn url(&self) -> Result<reqwest::Url, TransportError> {
        reqwest::Url::parse_with_params(
            &self.endpoint,
            [
                ("query", self.query.as_str()),
                ("session_id", self.session_id.as_str()),
                ("token", self.credential.token()),
            ],
        )
        .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))
    }

    /// Endpoint with the query string stripped, safe to log
    #[must_use]
    pub fn peer(&self) -> String {
        self.endpoint
            .split('?')
            .next()
            .unwrap_or(&self.endpoint)
            .to_string()
    }
}

/// What a reader task delivers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportFrame {
    /// One complete protocol frame
    Payload(String),
    /// Peer closed the connection
    Closed {
        /// Close reason, if the peer sent one
        reason: Option<String>,
    },
    /// The connection failed
    Failed(String),
}

/// Handle to one open connection
///
/// Dropping the handle has the same effect as [`Connection::close`].
#[derive(Debug)]
pub struct Connection {
    peer: String,
    frames: mpsc::Receiver<TransportFrame>,
    opened_at: Instant,
    frames_received: u64,
    closed: bool,
}

impl Connection {
    /// Wrap a frame receiver fed by a reader task
    #[must_use]
    pub fn new(peer: impl Into<String>, frames: mpsc::Receiver<TransportFrame>) -> Self {
        Self {
            peer: peer.into(),
            frames,
            opened_at: Instant::now(),
            frames_received: 0,
            closed: false,
        }
    }

    /// Where the connection goes (no credentials)
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Time since the connection opened
    #[must_use]
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Frames delivered so far
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Whether the handle has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next frame
    ///
    /// A closed handle or a reader task that went away without a close frame
    /// both read as `Closed`.
    pub async fn recv(&mut self) -> TransportFrame {
        if self.closed {
            return TransportFrame::Closed { reason: None };
        }
        match self.frames.recv().await {
            Some(frame) => {
                self.frames_received += 1;
                frame
            }
            None => TransportFrame::Closed { reason: None },
        }
    }

    /// Take a frame that has already arrived, without waiting
    pub fn try_recv(&mut self) -> Option<TransportFrame> {
        if self.closed {
            return None;
        }
        match self.frames.try_recv() {
            Ok(frame) => {
                self.frames_received += 1;
                Some(frame)
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Some(TransportFrame::Closed { reason: None })
            }
        }
    }

    /// Close the handle
    ///
    /// Frames buffered but not yet read are discarded. Idempotent.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.frames.close();
        while self.frames.try_recv().is_ok() {}
    }
}

/// Opens backend connections
///
/// Implement this trait to add a transport (WebSocket, in-process, ...).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Open a connection for one turn
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError>;
}
