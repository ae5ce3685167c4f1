//! Message envelope and request builder.
//!
//! An envelope is one complete protocol message:
//! ```text
//! { header, parent_header, channel, content, metadata, buffers }
//! ```
//!
//! `parent_header` is `{}` on requests and a copy of the request header on
//! every reply, status, and output message it causes.
//!
//! # Example
//!
//! ```
//! use kernelwire_client::protocol::{Channel, EnvelopeBuilder, ExecuteOptions};
//!
//! let builder = EnvelopeBuilder::new("");
//! let request = builder
//!     .execute_request("print(1)", &ExecuteOptions::default())
//!     .unwrap();
//!
//! assert_eq!(request.channel, Some(Channel::Shell));
//! assert_eq!(request.msg_type(), "execute_request");
//! assert!(request.parent_header.is_none());
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::content::{ExecuteOptions, ExecuteRequest};
use super::header::{msg_type, new_msg_id, MessageHeader};
use crate::error::{KernelwireError, Result};

/// Logical sub-stream a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Shell,
    Iopub,
    Stdin,
    Control,
}

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: MessageHeader,
    #[serde(
        default,
        serialize_with = "serialize_parent",
        deserialize_with = "deserialize_parent"
    )]
    pub parent_header: Option<MessageHeader>,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Map<String, Value>,
    #[serde(default, deserialize_with = "deserialize_buffers")]
    pub buffers: Vec<Bytes>,
}

impl Envelope {
    /// Message type from the header.
    #[inline]
    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    /// Own message id.
    #[inline]
    pub fn msg_id(&self) -> &str {
        &self.header.msg_id
    }

    /// Correlation key: the id of the request that caused this message.
    #[inline]
    pub fn parent_msg_id(&self) -> Option<&str> {
        self.parent_header.as_ref().map(|p| p.msg_id.as_str())
    }

    /// Check if the message arrived on the given channel.
    #[inline]
    pub fn is_on(&self, channel: Channel) -> bool {
        self.channel == Some(channel)
    }

    /// Decode the content into a typed payload.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.content.clone()).map_err(|e| {
            KernelwireError::Protocol(format!("invalid {} content: {}", self.msg_type(), e))
        })
    }

    /// Build a message that answers `parent` (used to simulate a kernel).
    pub fn reply_to(
        parent: &MessageHeader,
        channel: Channel,
        msg_type: &str,
        content: Value,
    ) -> Self {
        Self {
            header: MessageHeader::new(msg_type, &parent.session, &parent.username),
            parent_header: Some(parent.clone()),
            channel: Some(channel),
            content,
            metadata: Map::new(),
            buffers: Vec::new(),
        }
    }
}

/// Builds outgoing request envelopes for one client session.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    session: String,
    username: String,
}

impl EnvelopeBuilder {
    /// Create a builder with a fresh client session id.
    pub fn new(username: &str) -> Self {
        Self {
            session: new_msg_id(),
            username: username.to_string(),
        }
    }

    /// Client session id stamped into every header.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Build a shell request envelope.
    ///
    /// Only message types in [`msg_type::SUPPORTED_REQUESTS`] are accepted.
    pub fn build(&self, message_type: &str, content: Value) -> Result<Envelope> {
        if !msg_type::is_supported_request(message_type) {
            return Err(KernelwireError::Protocol(format!(
                "unsupported request type: {}",
                message_type
            )));
        }

        Ok(Envelope {
            header: MessageHeader::new(message_type, &self.session, &self.username),
            parent_header: None,
            channel: Some(Channel::Shell),
            content,
            metadata: Map::new(),
            buffers: Vec::new(),
        })
    }

    /// Build an `execute_request` envelope.
    pub fn execute_request(&self, code: &str, options: &ExecuteOptions) -> Result<Envelope> {
        let content = serde_json::to_value(ExecuteRequest::new(code, options))?;
        self.build(msg_type::EXECUTE_REQUEST, content)
    }
}

fn serialize_parent<S>(parent: &Option<MessageHeader>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match parent {
        Some(header) => header.serialize(serializer),
        None => Map::new().serialize(serializer),
    }
}

fn deserialize_parent<'de, D>(deserializer: D) -> std::result::Result<Option<MessageHeader>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Object(ref map) if map.is_empty() => Ok(None),
        other => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn deserialize_metadata<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

// Accepts `[]`, `{}`, null, or arrays of byte arrays.
fn deserialize_buffers<'de, D>(deserializer: D) -> std::result::Result<Vec<Bytes>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<Vec<u8>>(item)
                .map(Bytes::from)
                .map_err(serde::de::Error::custom)
        })
        .collect()
}
