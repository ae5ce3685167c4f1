//! Error types for kernelwire-client.

use std::time::Duration;

use thiserror::Error;

use crate::output::Output;

/// Main error type for all kernelwire operations.
#[derive(Debug, Error)]
pub enum KernelwireError {
    /// WebSocket handshake or server connection failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Send/receive failure on an established channel, or the channel is closed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No idle status arrived for the request before its deadline.
    ///
    /// Outputs that did arrive are kept in `partial_outputs`.
    #[error("Execution of {msg_id} timed out after {timeout:?}")]
    ExecutionTimeout {
        msg_id: String,
        timeout: Duration,
        partial_outputs: Vec<Output>,
    },

    /// The channel was closed while the request was outstanding.
    #[error("Execution of {msg_id} was cancelled")]
    Cancelled { msg_id: String },

    /// Protocol error (undecodable envelope, unsupported message type, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// REST call answered with a status code >= 400.
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// REST transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base URL is not usable.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// I/O error (process spawn, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<url::ParseError> for KernelwireError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Result type alias using KernelwireError.
pub type Result<T> = std::result::Result<T, KernelwireError>;
