//! In-Process Transport
//!
//! Channel-based connector for embedding a backend in the same process and for
//! tests. Each `connect` hands the caller-side [`Connection`] to the session
//! and the server-side [`InProcessServer`] to whoever holds the acceptor.
//!
//! # Usage
//!
//! ```ignore
//! let (connector, mut accepted) = InProcessConnector::new_pair();
//!
//! // Give `connector` to the StreamController, then after `send`:
//! let server = accepted.recv().await.unwrap();
//! server.send_json(json!({"type": "text", "text": "Hi"})).await?;
//! server.send_json(json!({"done": true})).await?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{ConnectRequest, Connection, Connector, TransportError, TransportFrame};

/// Default per-connection channel capacity
const DEFAULT_CAPACITY: usize = 100;

/// Connector that pairs each connection with an [`InProcessServer`]
pub struct InProcessConnector {
    accepted_tx: mpsc::UnboundedSender<InProcessServer>,
    capacity: usize,
    refusing: Arc<AtomicBool>,
}

impl InProcessConnector {
    /// Create a connector and the receiver of its server ends
    #[must_use]
    pub fn new_pair() -> (Self, mpsc::UnboundedReceiver<InProcessServer>) {
        Self::new_pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create with custom per-connection channel capacity
    #[must_use]
    pub fn new_pair_with_capacity(
        capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<InProcessServer>) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let connector = Self {
            accepted_tx,
            capacity: capacity.max(1),
            refusing: Arc::new(AtomicBool::new(false)),
        };
        (connector, accepted_rx)
    }

    /// Make subsequent `connect` calls fail (or succeed again)
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for InProcessConnector {
    fn name(&self) -> &str {
        "in-process"
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(
                "in-process server refused the connection".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let server = InProcessServer {
            tx,
            request: request.clone(),
        };

        self.accepted_tx
            .send(server)
            .map_err(|_| TransportError::ConnectionFailed("no in-process acceptor".to_string()))?;

        Ok(Connection::new(request.peer(), rx))
    }
}

/// Server side of an in-process connection
#[derive(Debug)]
pub struct InProcessServer {
    tx: mpsc::Sender<TransportFrame>,
    request: ConnectRequest,
}

impl InProcessServer {
    /// The parameters the client connected with
    #[must_use]
    pub fn request(&self) -> &ConnectRequest {
        &self.request
    }

    /// Send one raw frame
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionClosed` once the client has closed
    /// its handle.
    pub async fn send_raw(&self, raw: impl Into<String>) -> Result<(), TransportError> {
        self.push(TransportFrame::Payload(raw.into())).await
    }

    /// Send one JSON frame
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionClosed` once the client has closed
    /// its handle.
    pub async fn send_json(&self, frame: serde_json::Value) -> Result<(), TransportError> {
        self.send_raw(frame.to_string()).await
    }

    /// Close the connection from the server side
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionClosed` if the client already closed.
    pub async fn close(self, reason: Option<&str>) -> Result<(), TransportError> {
        self.push(TransportFrame::Closed {
            reason: reason.map(str::to_string),
        })
        .await
    }

    /// Simulate a network failure
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionClosed` if the client already closed.
    pub async fn fail(self, error: &str) -> Result<(), TransportError> {
        self.push(TransportFrame::Failed(error.to_string())).await
    }

    /// Whether the client side has closed its handle
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn push(&self, frame: TransportFrame) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}
