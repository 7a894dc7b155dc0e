//! WebSocket Transport
//!
//! Opens one receive-only WebSocket per turn against the analytics backend.
//! The query, session id and access token travel as URL query parameters;
//! nothing is written to the socket after the handshake.
//!
//! # Frame Mapping
//!
//! - Text message: one protocol frame
//! - Binary message: one protocol frame, decoded as lossy UTF-8
//! - Ping / Pong: answered by tungstenite, not forwarded
//! - Close message or end of stream: `TransportFrame::Closed`
//! - Socket error: `TransportFrame::Failed`
//!
//! Each WebSocket message is a complete frame; nothing is buffered across
//! messages.
//!
//! # Security
//!
//! The connector speaks plain `ws://`. Put a TLS-terminating proxy in front
//! of remote backends.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::traits::{ConnectRequest, Connection, Connector, TransportError, TransportFrame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector configuration
#[derive(Clone, Debug)]
pub struct WebSocketConnectorConfig {
    /// How long the handshake may take
    pub connect_timeout: Duration,
    /// Frames buffered between the reader task and the session
    pub channel_capacity: usize,
}

impl Default for WebSocketConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 100,
        }
    }
}

/// Connector for the backend's WebSocket chat endpoint
#[derive(Clone, Debug, Default)]
pub struct WebSocketConnector {
    config: WebSocketConnectorConfig,
}

impl WebSocketConnector {
    /// Create a connector
    #[must_use]
    pub fn new(config: WebSocketConnectorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError> {
        let url = request.url()?;
        let peer = request.peer();

        let (socket, response) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .map_err(|_| {
            TransportError::ConnectionFailed(format!(
                "handshake with {peer} timed out after {:?}",
                self.config.connect_timeout
            ))
        })?
        .map_err(|e| TransportError::ConnectionFailed(format!("{peer}: {e}")))?;

        tracing::debug!(peer = %peer, status = %response.status(), "WebSocket handshake complete");

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        tokio::spawn(pump(socket, tx, peer.clone()));

        Ok(Connection::new(peer, rx))
    }
}

/// Forward socket messages until either side goes away
async fn pump(mut socket: Socket, tx: mpsc::Sender<TransportFrame>, peer: String) {
    loop {
        let frame = tokio::select! {
            () = tx.closed() => {
                tracing::debug!(peer = %peer, "Handle closed, closing WebSocket");
                let _ = socket.close(None).await;
                return;
            }
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => TransportFrame::Payload(text),
                Some(Ok(Message::Binary(bytes))) => {
                    TransportFrame::Payload(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(close))) => TransportFrame::Closed {
                    reason: close
                        .map(|c| c.reason.to_string())
                        .filter(|r| !r.is_empty()),
                },
                Some(Err(e)) => TransportFrame::Failed(e.to_string()),
                None => TransportFrame::Closed { reason: None },
            },
        };

        let last = !matches!(frame, TransportFrame::Payload(_));
        if tx.send(frame).await.is_err() {
            let _ = socket.close(None).await;
            return;
        }
        if last {
            return;
        }
    }
}
