//! Message header and identifier generation.
//!
//! Every message carries a header:
//! ```text
//! { "username": "", "session": "<uuid>", "msg_id": "<uuid>",
//!   "msg_type": "execute_request", "version": "5.0", "date": "<ISO 8601>" }
//! ```
//!
//! `msg_id` is unique per message, not per request: a request and every
//! status/output message it causes have distinct `msg_id`s and share only
//! the `parent_header.msg_id`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message protocol version stamped into outgoing headers.
pub const PROTOCOL_VERSION: &str = "5.0";

/// Message type names used on the wire.
pub mod msg_type {
    /// Request to execute code (shell).
    pub const EXECUTE_REQUEST: &str = "execute_request";
    /// Reply to an execute request (shell).
    pub const EXECUTE_REPLY: &str = "execute_reply";
    /// Broadcast of the code being executed (iopub).
    pub const EXECUTE_INPUT: &str = "execute_input";
    /// Kernel execution state change (iopub).
    pub const STATUS: &str = "status";
    /// stdout/stderr text (iopub).
    pub const STREAM: &str = "stream";
    /// Rich display output (iopub).
    pub const DISPLAY_DATA: &str = "display_data";
    /// Value of the last expression (iopub).
    pub const EXECUTE_RESULT: &str = "execute_result";
    /// Exception raised during execution (iopub).
    pub const ERROR: &str = "error";

    /// Request types this client may send.
    pub const SUPPORTED_REQUESTS: &[&str] = &[EXECUTE_REQUEST];

    /// Iopub message types that become outputs of a request.
    pub const OUTPUTS: &[&str] = &[STREAM, DISPLAY_DATA, EXECUTE_RESULT, ERROR];

    /// Check if a message type carries an output fragment.
    #[inline]
    pub fn is_output(msg_type: &str) -> bool {
        OUTPUTS.contains(&msg_type)
    }

    /// Check if this client can send a message type.
    #[inline]
    pub fn is_supported_request(msg_type: &str) -> bool {
        SUPPORTED_REQUESTS.contains(&msg_type)
    }
}

/// Generate a fresh message id (128-bit random, 32 hex chars).
pub fn new_msg_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current UTC time as an ISO 8601 string.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Header of a message. Field order matches the wire layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default)]
    pub username: String,
    /// Identifies the client or kernel process that produced the message.
    #[serde(default)]
    pub session: String,
    pub msg_id: String,
    #[serde(default)]
    pub msg_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub date: String,
}

impl MessageHeader {
    /// Create a header with a fresh id and the current timestamp.
    pub fn new(msg_type: &str, session: &str, username: &str) -> Self {
        Self {
            username: username.to_string(),
            session: session.to_string(),
            msg_id: new_msg_id(),
            msg_type: msg_type.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            date: now_iso8601(),
        }
    }
}
