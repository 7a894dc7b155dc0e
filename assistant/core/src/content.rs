//! Assistant Message Content
//!
//! The tagged union an assistant message moves through while its turn is
//! streamed. Only [`crate::reducer`] produces new values of these types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caption used when a chart arrives before any prose
pub const DEFAULT_CHART_CAPTION: &str = "Here is the chart you asked for:";

/// Caption used when a table arrives before any prose
pub const DEFAULT_TABLE_CAPTION: &str = "Here is the data you asked for:";

/// Where a turn-ending error came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// The backend sent an `error` frame
    Server,
    /// The connection failed or closed before `done`
    Transport,
    /// The credential pre-flight failed; no connection was opened
    Auth,
    /// No frame arrived within the idle timeout
    Timeout,
}

/// State of an assistant message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContentState {
    /// Backend is working; no answer content yet
    Thinking {
        /// Human-readable progress labels, in arrival order
        steps: Vec<String>,
    },
    /// Prose is being appended
    Answering {
        /// Accumulated text
        text: String,
        /// Progress labels seen before and during the answer
        thinking_steps: Vec<String>,
    },
    /// A chart result replaced the prose
    Chart {
        /// Opaque visualization descriptor
        spec: Value,
        /// Text accumulated before the switch
        caption: String,
    },
    /// A tabular result replaced the prose
    Table {
        /// Result records
        rows: Vec<Value>,
        /// Text accumulated before the switch
        caption: String,
    },
    /// Turn failed
    Errored {
        /// User-visible explanation
        message: String,
        /// Failure category
        origin: ErrorOrigin,
        /// Extra payload from a server `error` frame
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// User stopped the turn
    Cancelled {
        /// State at the moment of cancellation
        partial: Box<ContentState>,
    },
    /// Turn finished successfully
    Complete {
        /// The content that was showing when `done` arrived
        #[serde(rename = "final")]
        final_content: FinalContent,
        /// Backend response identifier
        response_id: String,
    },
}

/// Successful result of a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalContent {
    /// Plain prose
    Answer {
        /// Full answer text
        text: String,
        /// Progress labels seen during the turn
        thinking_steps: Vec<String>,
    },
    /// Chart result
    Chart {
        /// Opaque visualization descriptor
        spec: Value,
        /// Caption shown with the chart
        caption: String,
    },
    /// Table result
    Table {
        /// Result records
        rows: Vec<Value>,
        /// Caption shown with the table
        caption: String,
    },
}

impl ContentState {
    /// Fresh placeholder state
    #[must_use]
    pub fn thinking() -> Self {
        Self::Thinking { steps: Vec::new() }
    }

    /// Whether no further event may change this state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Errored { .. } | Self::Cancelled { .. } | Self::Complete { .. }
        )
    }

    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Answering { .. } => "answering",
            Self::Chart { .. } => "chart",
            Self::Table { .. } => "table",
            Self::Errored { .. } => "errored",
            Self::Cancelled { .. } => "cancelled",
            Self::Complete { .. } => "complete",
        }
    }

    /// Prose accumulated so far, if the state carries any
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Answering { text, .. } => Some(text),
            Self::Complete {
                final_content: FinalContent::Answer { text, .. },
                ..
            } => Some(text),
            _ => None,
        }
    }
}
