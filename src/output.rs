//! Output aggregation.
//!
//! Each output message of a request is classified into an [`Output`] and
//! appended to that request's sequence in arrival order. Nothing is merged or
//! deduplicated; [`render_text`] is a display helper for callers that want
//! consecutive stream fragments joined.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::{
    msg_type, DisplayDataContent, Envelope, ErrorContent, ExecuteResultContent, StreamContent,
};

/// One result fragment of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    /// Text written to stdout or stderr.
    Stream { name: String, text: String },
    /// Exception raised by the executed code.
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
    /// Rich output (plots, HTML, ...) keyed by MIME type.
    DisplayData {
        metadata: Map<String, Value>,
        data: Map<String, Value>,
    },
    /// Value of the final expression.
    ExecuteResult {
        metadata: Map<String, Value>,
        data: Map<String, Value>,
        execution_count: Option<u64>,
    },
    /// Message type or content this client doesn't understand.
    Unknown { msg_type: String, content: Value },
}

impl Output {
    /// Classify a message's content by its type.
    ///
    /// Unknown types and content that fails to decode become
    /// [`Output::Unknown`] instead of an error.
    pub fn classify(message_type: &str, content: &Value) -> Self {
        let typed = match message_type {
            msg_type::STREAM => serde_json::from_value::<StreamContent>(content.clone())
                .ok()
                .map(|c| Self::Stream {
                    name: c.name,
                    text: c.text,
                }),
            msg_type::ERROR => serde_json::from_value::<ErrorContent>(content.clone())
                .ok()
                .map(|c| Self::Error {
                    ename: c.ename,
                    evalue: c.evalue,
                    traceback: c.traceback,
                }),
            msg_type::DISPLAY_DATA => serde_json::from_value::<DisplayDataContent>(content.clone())
                .ok()
                .map(|c| Self::DisplayData {
                    metadata: c.metadata,
                    data: c.data,
                }),
            msg_type::EXECUTE_RESULT => {
                serde_json::from_value::<ExecuteResultContent>(content.clone())
                    .ok()
                    .map(|c| Self::ExecuteResult {
                        metadata: c.metadata,
                        data: c.data,
                        execution_count: c.execution_count,
                    })
            }
            _ => None,
        };

        typed.unwrap_or_else(|| Self::Unknown {
            msg_type: message_type.to_string(),
            content: content.clone(),
        })
    }

    /// Classify an envelope.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self::classify(envelope.msg_type(), &envelope.content)
    }

    /// Check if this is an error output.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// `text/plain` representation, if any.
    pub fn plain_text(&self) -> Option<&str> {
        match self {
            Self::Stream { text, .. } => Some(text),
            Self::DisplayData { data, .. } | Self::ExecuteResult { data, .. } => {
                data.get("text/plain").and_then(Value::as_str)
            }
            _ => None,
        }
    }
}

/// Render outputs as plain text.
///
/// Consecutive stream fragments are concatenated; `text/plain` payloads and
/// error tracebacks each go on their own line.
pub fn render_text(outputs: &[Output]) -> String {
    let mut rendered = String::new();
    let mut last_stream: Option<&str> = None;

    for output in outputs {
        match output {
            Output::Stream { name, text } => {
                if last_stream.is_some_and(|prev| prev != name) && !rendered.ends_with('\n') {
                    rendered.push('\n');
                }
                rendered.push_str(text);
                last_stream = Some(name);
                continue;
            }
            Output::Error {
                ename,
                evalue,
                traceback,
            } => {
                start_line(&mut rendered);
                if traceback.is_empty() {
                    rendered.push_str(&format!("{}: {}", ename, evalue));
                } else {
                    rendered.push_str(&traceback.join("\n"));
                }
                rendered.push('\n');
            }
            Output::DisplayData { .. } | Output::ExecuteResult { .. } => {
                if let Some(text) = output.plain_text() {
                    start_line(&mut rendered);
                    rendered.push_str(text);
                    rendered.push('\n');
                }
            }
            Output::Unknown { .. } => {}
        }
        last_stream = None;
    }

    rendered
}

fn start_line(buf: &mut String) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
}
