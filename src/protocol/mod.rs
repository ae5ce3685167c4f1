//! Protocol module - message envelopes, headers, and typed content.
//!
//! This module implements the kernel messaging format:
//! - Message header with per-message unique ids
//! - Envelope with parent header (the correlation key) and channel
//! - Typed content for the message types this client understands

mod content;
mod envelope;
mod header;

pub use content::{
    DisplayDataContent, ErrorContent, ExecuteOptions, ExecuteRequest, ExecuteResultContent,
    ExecutionState, StatusContent, StreamContent,
};
pub use envelope::{Channel, Envelope, EnvelopeBuilder};
pub use header::{msg_type, new_msg_id, now_iso8601, MessageHeader, PROTOCOL_VERSION};
