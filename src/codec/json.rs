//! JSON codec using `serde_json`.
//!
//! Envelopes travel as one JSON object per WebSocket text frame. Decoding is
//! lenient about optional fields (see [`Envelope`]) but a frame that is not a
//! JSON object with a `header.msg_id` is rejected.

use crate::error::{KernelwireError, Result};
use crate::protocol::Envelope;

/// JSON codec for envelopes.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode an envelope to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns error if the content cannot be serialized.
    #[inline]
    pub fn encode(envelope: &Envelope) -> Result<String> {
        Ok(serde_json::to_string(envelope)?)
    }

    /// Decode a JSON text frame into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`KernelwireError::Protocol`] if the frame is not a valid envelope.
    pub fn decode(text: &str) -> Result<Envelope> {
        serde_json::from_str(text)
            .map_err(|e| KernelwireError::Protocol(format!("undecodable envelope: {}", e)))
    }

    /// Decode a binary frame holding UTF-8 JSON.
    pub fn decode_slice(bytes: &[u8]) -> Result<Envelope> {
        serde_json::from_slice(bytes)
            .map_err(|e| KernelwireError::Protocol(format!("undecodable envelope: {}", e)))
    }
}
