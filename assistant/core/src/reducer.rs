//! Message Reducer
//!
//! Pure state transitions for assistant messages. No I/O, no clocks, no
//! randomness: `reduce` can be tested with literal `(state, event) -> state`
//! tables.
//!
//! | Current              | Event      | Next                                      |
//! |----------------------|------------|-------------------------------------------|
//! | Thinking             | Progress   | Thinking (label appended)                 |
//! | Thinking             | TextDelta  | Answering (steps retained)                |
//! | Answering            | TextDelta  | Answering (text appended)                 |
//! | Answering            | Progress   | Answering (label appended to steps)       |
//! | Thinking / Answering | ChartReady | Chart (caption = text so far or default)  |
//! | Thinking / Answering | TableReady | Table (caption = text so far or default)  |
//! | Chart / Table        | Chart/TableReady | newer result, caption kept          |
//! | any non-terminal     | Error      | Errored                                   |
//! | any non-terminal     | Done       | Complete                                  |
//! | terminal             | anything   | unchanged                                 |
//!
//! Pairs not listed leave the state unchanged.

use crate::content::{ContentState, FinalContent, DEFAULT_CHART_CAPTION, DEFAULT_TABLE_CAPTION};
use crate::events::DecodedEvent;

/// Apply one event to a content state
#[must_use]
pub fn reduce(state: ContentState, event: &DecodedEvent) -> ContentState {
    if state.is_terminal() {
        return state;
    }

    match (state, event) {
        (state, DecodedEvent::Malformed { .. }) => state,

        (
            _,
            DecodedEvent::Error {
                message,
                details,
                origin,
            },
        ) => ContentState::Errored {
            message: message.clone(),
            origin: *origin,
            details: details.clone(),
        },

        (state, DecodedEvent::Done { response_id }) => ContentState::Complete {
            final_content: finalize(state),
            response_id: response_id.clone(),
        },

        (ContentState::Thinking { mut steps }, DecodedEvent::Progress { label }) => {
            steps.push(label.clone());
            ContentState::Thinking { steps }
        }

        (
            ContentState::Answering {
                text,
                mut thinking_steps,
            },
            DecodedEvent::Progress { label },
        ) => {
            thinking_steps.push(label.clone());
            ContentState::Answering {
                text,
                thinking_steps,
            }
        }

        (ContentState::Thinking { steps }, DecodedEvent::TextDelta { text }) => {
            ContentState::Answering {
                text: text.clone(),
                thinking_steps: steps,
            }
        }

        (
            ContentState::Answering {
                mut text,
                thinking_steps,
            },
            DecodedEvent::TextDelta { text: delta },
        ) => {
            text.push_str(delta);
            ContentState::Answering {
                text,
                thinking_steps,
            }
        }

        (state, DecodedEvent::ChartReady { spec }) => match caption_of(&state) {
            Some(caption) => ContentState::Chart {
                spec: spec.clone(),
                caption: caption.unwrap_or_else(|| DEFAULT_CHART_CAPTION.to_string()),
            },
            None => state,
        },

        (state, DecodedEvent::TableReady { rows }) => match caption_of(&state) {
            Some(caption) => ContentState::Table {
                rows: rows.clone(),
                caption: caption.unwrap_or_else(|| DEFAULT_TABLE_CAPTION.to_string()),
            },
            None => state,
        },

        // Chart/Table ignore prose and progress once the result has landed
        (state, DecodedEvent::Progress { .. } | DecodedEvent::TextDelta { .. }) => state,
    }
}

/// Cancel a non-terminal state, keeping what had arrived
#[must_use]
pub fn cancel(state: ContentState) -> ContentState {
    if state.is_terminal() {
        return state;
    }
    ContentState::Cancelled {
        partial: Box::new(state),
    }
}

/// Caption carried into a result switch
///
/// Outer `None`: the state cannot switch. Inner `None`: no prose yet, use the
/// default caption.
fn caption_of(state: &ContentState) -> Option<Option<String>> {
    match state {
        ContentState::Thinking { .. } => Some(None),
        ContentState::Answering { text, .. } if text.is_empty() => Some(None),
        ContentState::Answering { text, .. } => Some(Some(text.clone())),
        ContentState::Chart { caption, .. } | ContentState::Table { caption, .. } => {
            Some(Some(caption.clone()))
        }
        _ => None,
    }
}

fn finalize(state: ContentState) -> FinalContent {
    match state {
        ContentState::Thinking { steps } => FinalContent::Answer {
            text: String::new(),
            thinking_steps: steps,
        },
        ContentState::Answering {
            text,
            thinking_steps,
        } => FinalContent::Answer {
            text,
            thinking_steps,
        },
        ContentState::Chart { spec, caption } => FinalContent::Chart { spec, caption },
        ContentState::Table { rows, caption } => FinalContent::Table { rows, caption },
        // reduce() returns early for terminal states
        ContentState::Errored { .. }
        | ContentState::Cancelled { .. }
        | ContentState::Complete { .. } => FinalContent::Answer {
            text: String::new(),
            thinking_steps: Vec::new(),
        },
    }
}
