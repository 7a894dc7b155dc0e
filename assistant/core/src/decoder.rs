//! Frame Decoder
//!
//! Turns one raw backend frame (a JSON object) into one [`DecodedEvent`].
//!
//! # Frame Format
//!
//! ```text
//! {"type":"tool_progress","tool":"<stage-id>"}
//! {"type":"text","text":"<delta>","done":false}
//! {"type":"chart","chart_spec":{...},"done":false}
//! {"type":"table","data":[...],"done":false}
//! {"type":"error","error":"<message>","details":{...}}
//! {"done":true,"response_id":"<optional>"}
//! ```
//!
//! Decoding never fails: anything outside this shape becomes
//! [`DecodedEvent::Malformed`].
//!
//! A content frame may also carry `"done": true`. It still decodes to its
//! content event; the flag is reported next to it in [`DecodedFrame`].

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::content::ErrorOrigin;
use crate::events::DecodedEvent;

/// Maximum frame size accepted by the decoder (10 MB)
///
/// Larger frames are reported as malformed without being parsed.
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Label shown for stage identifiers missing from the table
pub const DEFAULT_PROGRESS_LABEL: &str = "Working on it...";

/// Message used when an `error` frame carries no text
pub const GENERIC_SERVER_ERROR: &str = "The server reported an error";

/// Stage identifiers the analytics backend is known to emit
const BUILTIN_LABELS: &[(&str, &str)] = &[
    ("consultar_banco_dados", "Querying the sales database"),
    ("executar_sql", "Running SQL query"),
    ("analisar_vendas", "Analyzing sales figures"),
    ("analisar_estoque", "Checking inventory levels"),
    ("buscar_produtos", "Looking up products"),
    ("buscar_clientes", "Looking up customers"),
    ("gerar_grafico_universal", "Building chart"),
    ("gerar_tabela", "Building table"),
    ("executar_codigo", "Running code"),
    ("gerar_codigo", "Writing code"),
    ("pesquisar_web", "Searching the web"),
    ("resumir_resultados", "Summarizing results"),
];

/// Lookup table from backend stage identifiers to user-facing labels
///
/// Unknown identifiers map to a default label so new backend stages never
/// break the client.
#[derive(Clone, Debug)]
pub struct ProgressLabels {
    labels: HashMap<String, String>,
    default_label: String,
}

impl Default for ProgressLabels {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProgressLabels {
    /// Empty table; every stage maps to the default label
    #[must_use]
    pub fn empty() -> Self {
        Self {
            labels: HashMap::new(),
            default_label: DEFAULT_PROGRESS_LABEL.to_string(),
        }
    }

    /// Table for the stages the analytics backend ships with
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (stage, label) in BUILTIN_LABELS {
            table.insert(*stage, *label);
        }
        table
    }

    /// Add or replace a label
    pub fn insert(&mut self, stage: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(stage.into(), label.into());
    }

    /// Merge overrides on top of this table
    #[must_use]
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (stage, label) in overrides {
            self.insert(stage, label);
        }
        self
    }

    /// Replace the catch-all label
    #[must_use]
    pub fn with_default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = label.into();
        self
    }

    /// Label for a stage identifier
    #[must_use]
    pub fn label_for(&self, stage: &str) -> &str {
        self.labels
            .get(stage)
            .map_or(self.default_label.as_str(), String::as_str)
    }
}

/// Raw shape of a backend frame
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    tool: Option<String>,
    text: Option<String>,
    chart_spec: Option<Value>,
    data: Option<Value>,
    error: Option<Value>,
    details: Option<Value>,
    #[serde(default)]
    done: bool,
    response_id: Option<String>,
}

/// One decoded frame
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFrame {
    /// The frame's own event
    pub event: DecodedEvent,
    /// `Done` signalled by a content frame's `done: true` flag
    pub done: Option<DecodedEvent>,
}

impl DecodedFrame {
    fn single(event: DecodedEvent) -> Self {
        Self { event, done: None }
    }
}

/// Decodes backend frames into typed events
#[derive(Clone, Debug, Default)]
pub struct FrameDecoder {
    labels: ProgressLabels,
}

impl FrameDecoder {
    /// Create a decoder with the given label table
    #[must_use]
    pub fn new(labels: ProgressLabels) -> Self {
        Self { labels }
    }

    /// The label table in use
    #[must_use]
    pub fn labels(&self) -> &ProgressLabels {
        &self.labels
    }

    /// Decode one frame
    #[must_use]
    pub fn decode(&self, raw: &str) -> DecodedFrame {
        if raw.len() > MAX_FRAME_SIZE {
            return DecodedFrame::single(malformed(
                raw,
                format!("frame too large: {} bytes (max: {MAX_FRAME_SIZE})", raw.len()),
            ));
        }

        let frame: WireFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => return DecodedFrame::single(malformed(raw, e.to_string())),
        };

        let flagged_done = frame.done && frame.kind.is_some();
        let response_id = frame.response_id.clone();
        let event = self.event(raw, frame);

        let carries_content = matches!(
            event,
            DecodedEvent::Progress { .. }
                | DecodedEvent::TextDelta { .. }
                | DecodedEvent::ChartReady { .. }
                | DecodedEvent::TableReady { .. }
        );
        DecodedFrame {
            event,
            done: (flagged_done && carries_content).then(|| done(response_id)),
        }
    }

    fn event(&self, raw: &str, frame: WireFrame) -> DecodedEvent {
        match frame.kind.as_deref() {
            Some("tool_progress") => match frame.tool {
                Some(tool) => DecodedEvent::Progress {
                    label: self.labels.label_for(&tool).to_string(),
                },
                None => malformed(raw, "tool_progress frame without `tool`"),
            },
            Some("text") => match frame.text {
                Some(text) => DecodedEvent::TextDelta { text },
                None => malformed(raw, "text frame without `text`"),
            },
            Some("chart") => match frame.chart_spec {
                Some(spec) => DecodedEvent::ChartReady { spec },
                None => malformed(raw, "chart frame without `chart_spec`"),
            },
            Some("table") => match frame.data {
                Some(Value::Array(rows)) => DecodedEvent::TableReady { rows },
                Some(_) => malformed(raw, "table frame `data` is not an array"),
                None => malformed(raw, "table frame without `data`"),
            },
            Some("error") => DecodedEvent::Error {
                message: error_message(frame.error.as_ref()),
                details: frame.details,
                origin: ErrorOrigin::Server,
            },
            Some("done") => done(frame.response_id),
            Some(other) => malformed(raw, format!("unknown frame type `{other}`")),
            None if frame.done => done(frame.response_id),
            None => malformed(raw, "frame has neither `type` nor `done`"),
        }
    }
}

fn malformed(raw: &str, reason: impl Into<String>) -> DecodedEvent {
    DecodedEvent::Malformed {
        raw: raw.to_string(),
        reason: reason.into(),
    }
}

fn done(response_id: Option<String>) -> DecodedEvent {
    let response_id = response_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    DecodedEvent::Done { response_id }
}

fn error_message(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| GENERIC_SERVER_ERROR.to_string(), str::to_string),
        _ => GENERIC_SERVER_ERROR.to_string(),
    }
}
