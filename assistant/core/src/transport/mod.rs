//! Transport Layer for Backend Streams
//!
//! Provides abstraction over how a turn's frames reach the session:
//! - `InProcess`: Direct channel communication (embedded backends, tests)
//! - `WebSocket`: Receive-only socket to the analytics backend (`websocket` feature)
//!
//! # Design Philosophy
//!
//! The transport layer owns sockets and reader tasks. The session only ever
//! holds a [`Connection`] handle, so closing a stream is synchronous from the
//! session's point of view and no frame is delivered after close.

pub mod in_process;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use in_process::{InProcessConnector, InProcessServer};
pub use traits::{ConnectRequest, Connection, Connector, TransportError, TransportFrame};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketConnectorConfig};
