//! Turning session updates into terminal output
//!
//! Plain mode prints progress labels as they arrive, streams answer text
//! as deltas and prints chart and table results once the turn completes.
//! JSON mode prints one object per update.

use std::collections::HashMap;

use serde_json::{json, Value};

use assistant_core::{
    CloseReason, ContentState, FinalContent, Message, MessageContent, MessageId, MessageRole,
    SessionUpdate,
};

/// How much of an assistant message has been printed already
#[derive(Debug, Default)]
struct Printed {
    steps: usize,
    text: usize,
}

/// Stateful renderer; one per terminal
#[derive(Debug)]
pub struct Renderer {
    json: bool,
    printed: HashMap<MessageId, Printed>,
}

impl Renderer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            printed: HashMap::new(),
        }
    }

    /// Render messages that existed before the first update
    pub fn history(&mut self, messages: &[Message]) -> String {
        messages
            .iter()
            .map(|message| self.appended(message))
            .collect()
    }

    /// Render one update; empty when there is nothing to show
    pub fn render(&mut self, update: &SessionUpdate) -> String {
        match update {
            SessionUpdate::MessageAppended { message } => self.appended(message),
            SessionUpdate::MessageUpdated { message } => self.updated(message),
            SessionUpdate::StreamClosed { target, reason } => {
                self.printed.remove(target);
                if self.json {
                    line(&json!({
                        "event": "stream_closed",
                        "message_id": target,
                        "reason": close_reason(*reason),
                    }))
                } else {
                    String::new()
                }
            }
            SessionUpdate::SessionCleared { session_id } => {
                self.printed.clear();
                if self.json {
                    line(&json!({"event": "session_cleared", "session_id": session_id}))
                } else {
                    format!("[new session {session_id}]\n")
                }
            }
        }
    }

    /// A note from the CLI itself
    pub fn notice(&self, text: &str) -> String {
        if self.json {
            line(&json!({"event": "notice", "text": text}))
        } else {
            format!("[{text}]\n")
        }
    }

    fn appended(&mut self, message: &Message) -> String {
        if self.json {
            return line(&json!({"event": "message_appended", "message": message}));
        }

        match (message.role, message.content()) {
            // Echo of what was just typed
            (MessageRole::User, _) => String::new(),
            (MessageRole::System, MessageContent::Text(text)) => format!("[system] {text}\n"),
            (_, MessageContent::Assistant(state)) => {
                self.printed.insert(message.id.clone(), Printed::default());
                self.state(&message.id, state)
            }
            (_, MessageContent::Text(text)) => format!("{text}\n"),
        }
    }

    fn updated(&mut self, message: &Message) -> String {
        if self.json {
            return line(&json!({"event": "message_updated", "message": message}));
        }

        match message.state() {
            Some(state) => self.state(&message.id, state),
            None => String::new(),
        }
    }

    fn state(&mut self, id: &MessageId, state: &ContentState) -> String {
        let printed = self.printed.entry(id.clone()).or_default();
        let mut out = String::new();

        match state {
            ContentState::Thinking { steps } => push_steps(&mut out, printed, steps),
            ContentState::Answering {
                text,
                thinking_steps,
            } => {
                push_steps(&mut out, printed, thinking_steps);
                push_text(&mut out, printed, text);
            }
            ContentState::Chart { .. } | ContentState::Table { .. } => {}
            ContentState::Complete { final_content, .. } => {
                match final_content {
                    FinalContent::Answer {
                        text,
                        thinking_steps,
                    } => {
                        push_steps(&mut out, printed, thinking_steps);
                        push_text(&mut out, printed, text);
                        out.push('\n');
                    }
                    FinalContent::Chart { spec, caption } => {
                        end_line(&mut out, printed);
                        out.push_str(&format!("[chart] {caption}\n{spec}\n"));
                    }
                    FinalContent::Table { rows, caption } => {
                        end_line(&mut out, printed);
                        out.push_str(&format!("[table] {caption} ({} rows)\n", rows.len()));
                        for row in rows {
                            out.push_str(&format!("{row}\n"));
                        }
                    }
                }
                self.printed.remove(id);
            }
            ContentState::Errored { message, .. } => {
                end_line(&mut out, printed);
                out.push_str(&format!("[error] {message}\n"));
                self.printed.remove(id);
            }
            ContentState::Cancelled { .. } => {
                end_line(&mut out, printed);
                out.push_str("[stopped]\n");
                self.printed.remove(id);
            }
        }

        out
    }
}

fn push_steps(out: &mut String, printed: &mut Printed, steps: &[String]) {
    for step in steps.iter().skip(printed.steps) {
        out.push_str(&format!("  · {step}\n"));
    }
    printed.steps = printed.steps.max(steps.len());
}

// Text only grows by appending, so the printed length is a char boundary
fn push_text(out: &mut String, printed: &mut Printed, text: &str) {
    if let Some(delta) = text.get(printed.text..) {
        out.push_str(delta);
        printed.text = text.len();
    }
}

fn end_line(out: &mut String, printed: &Printed) {
    if printed.text > 0 {
        out.push('\n');
    }
}

fn close_reason(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::Completed => "completed",
        CloseReason::ServerError => "server_error",
        CloseReason::TransportError => "transport_error",
        CloseReason::AuthFailed => "auth_failed",
        CloseReason::TimedOut => "timed_out",
        CloseReason::Cancelled => "cancelled",
    }
}

fn line(value: &Value) -> String {
    format!("{value}\n")
}
