//! Stream Events
//!
//! Typed events produced by the [`decoder`](crate::decoder) from backend
//! frames, and consumed by the [`reducer`](crate::reducer).
//!
//! # Design Philosophy
//!
//! Every frame becomes exactly one event. Frames the client does not
//! understand are kept as [`DecodedEvent::Malformed`] instead of failing, so a
//! single bad frame never aborts an otherwise healthy stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::ErrorOrigin;

/// A decoded backend update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecodedEvent {
    /// Backend moved to a new stage
    Progress {
        /// User-facing label for the stage
        label: String,
    },
    /// A piece of answer prose
    TextDelta {
        /// Text to append
        text: String,
    },
    /// A chart result is ready
    ChartReady {
        /// Opaque visualization descriptor
        spec: Value,
    },
    /// A tabular result is ready
    TableReady {
        /// Result records
        rows: Vec<Value>,
    },
    /// The turn failed
    Error {
        /// User-visible explanation
        message: String,
        /// Optional structured detail from the backend
        details: Option<Value>,
        /// Where the failure came from
        origin: ErrorOrigin,
    },
    /// The turn finished
    Done {
        /// Backend response identifier (generated when the frame has none)
        response_id: String,
    },
    /// Frame could not be understood
    Malformed {
        /// The raw frame as received
        raw: String,
        /// Why decoding failed
        reason: String,
    },
}

impl DecodedEvent {
    /// Build a server-reported error
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
            origin: ErrorOrigin::Server,
        }
    }

    /// Build an error raised on the client side of the connection
    pub fn local_error(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
            origin,
        }
    }

    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::TextDelta { .. } => "text_delta",
            Self::ChartReady { .. } => "chart_ready",
            Self::TableReady { .. } => "table_ready",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
            Self::Malformed { .. } => "malformed",
        }
    }

    /// Whether this event ends the turn
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }
}
