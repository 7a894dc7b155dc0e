//! Assistant Core - Streaming Conversation Sessions for retail-insights
//!
//! This crate turns the analytics backend's incremental frame stream into a
//! consistent conversation history, independent of any UI. A chat screen, a
//! code-chat panel, a playground or a headless test harness all drive the
//! same [`StreamController`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        UI Surfaces                                │
//! │        send / cancel / clear            SessionUpdate             │
//! └───────────────┬──────────────────────────────▲───────────────────┘
//!                 │                              │
//! ┌───────────────▼──────────────────────────────┴───────────────────┐
//! │                      StreamController                             │
//! │  ┌────────────┐   ┌──────────────┐   ┌──────────────────────────┐ │
//! │  │ AuthProvider│  │ FrameDecoder │   │ SessionStore             │ │
//! │  │ (pre-flight)│  │ frame→event  │──▶│ messages + ActiveStream  │ │
//! │  └────────────┘   └──────▲───────┘   │   └─ reducer (pure)      │ │
//! │                          │           └──────────────────────────┘ │
//! └──────────────────────────┼───────────────────────────────────────┘
//!                            │ TransportFrame
//! ┌──────────────────────────┴───────────────────────────────────────┐
//! │  Connector (WebSocket / in-process) ── reader task per turn       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamController`]: Turn lifecycle, frame pump, cancellation
//! - [`SessionStore`]: Message history and the single active stream
//! - [`FrameDecoder`]: Raw frame to [`DecodedEvent`]
//! - [`ContentState`]: What an assistant message currently shows
//! - [`Connector`]: Opens one connection per turn
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use assistant_core::{
//!     auth::StaticCredential, persistence::MemorySessionIdStore,
//!     transport::WebSocketConnector, ControllerConfig, StreamController,
//! };
//!
//! let mut controller = StreamController::restore(
//!     StaticCredential::new("token"),
//!     WebSocketConnector::default(),
//!     Arc::new(MemorySessionIdStore::new()),
//!     ControllerConfig::default(),
//! )
//! .await;
//!
//! controller.send("Top 5 stores by revenue").await?;
//! controller.run_until_closed().await;
//! ```
//!
//! # Module Overview
//!
//! - [`auth`]: Credential providers consulted before each turn
//! - [`config`]: TOML + environment configuration
//! - [`content`]: Assistant message content states
//! - [`controller`]: The stream controller
//! - [`decoder`]: Backend frame decoding and progress labels
//! - [`events`]: Decoded stream events
//! - [`messages`]: Identifiers and message records
//! - [`persistence`]: Session id persistence
//! - [`reducer`]: Pure content state transitions
//! - [`session`]: The session store
//! - [`transport`]: Connections (in-process, WebSocket)

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod content;
pub mod controller;
pub mod decoder;
pub mod events;
pub mod messages;
pub mod persistence;
pub mod reducer;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use auth::{AuthError, AuthProvider, Credential};
pub use config::{load_config, AssistantConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use content::{ContentState, ErrorOrigin, FinalContent};
pub use controller::{
    CloseReason, ConnectionPhase, ControllerConfig, Inbound, SessionUpdate, StreamController,
};
pub use decoder::{DecodedFrame, FrameDecoder, ProgressLabels};
pub use events::DecodedEvent;
pub use messages::{Message, MessageContent, MessageId, MessageRole, SessionId};
pub use persistence::{PersistenceError, SessionIdStore};
pub use session::{ApplyOutcome, ClearRejected, SendRejected, SessionStore};
pub use transport::{Connection, Connector, TransportError, TransportFrame};
