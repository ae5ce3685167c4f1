//! Immutable client and channel configuration.
//!
//! [`ClientConfig`] carries the server base URL and credentials and is passed
//! explicitly to every component that talks to the server. [`ChannelConfig`]
//! tunes a single kernel channel.
//!
//! # Example
//!
//! ```
//! use kernelwire_client::config::ClientConfig;
//!
//! let config = ClientConfig::new("http://localhost:8888/")
//!     .unwrap()
//!     .with_token("secret");
//!
//! assert_eq!(config.ws_base_url().unwrap().as_str(), "ws://localhost:8888/");
//! assert_eq!(config.authorization_header().as_deref(), Some("token secret"));
//! ```

use std::time::Duration;

use url::Url;

use crate::error::{KernelwireError, Result};
use crate::protocol::ExecuteOptions;

/// Default server address when `JUPYTER_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";

/// Environment variable holding the server base URL.
pub const BASE_URL_ENV: &str = "JUPYTER_BASE_URL";

/// Environment variable holding the access token.
pub const TOKEN_ENV: &str = "JUPYTER_TOKEN";

/// Default timeout for a single `execute` call.
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the outbound message queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default timeout for REST requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server location and credentials.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    token: Option<String>,
    username: String,
    request_timeout: Duration,
}

impl ClientConfig {
    /// Create a config for the given `http://` or `https://` base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(&format!("{}/", trimmed))?;

        match base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(KernelwireError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, base_url
                )))
            }
        }

        Ok(Self {
            base_url,
            token: None,
            username: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Build a config from `JUPYTER_BASE_URL` and `JUPYTER_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let config = Self::new(&base_url)?;

        Ok(match std::env::var(TOKEN_ENV) {
            Ok(token) => config.with_token(token),
            Err(_) => config,
        })
    }

    /// Set the access token. An empty token disables the header.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }

    /// Set the username stamped into outgoing message headers.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the timeout applied to REST requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// HTTP base URL, always ending with `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Access token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Username for message headers.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// REST request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// WebSocket base URL: `http` becomes `ws`, `https` becomes `wss`.
    pub fn ws_base_url(&self) -> Result<Url> {
        let scheme = match self.base_url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(KernelwireError::InvalidUrl(format!(
                    "cannot derive websocket scheme from '{}'",
                    other
                )))
            }
        };

        let mut ws = self.base_url.clone();
        ws.set_scheme(scheme).map_err(|_| {
            KernelwireError::InvalidUrl(format!("cannot set scheme on {}", self.base_url))
        })?;
        Ok(ws)
    }

    /// Resolve an API path (e.g. `api/kernels`) against the base URL.
    pub fn api_url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// WebSocket URL of a kernel's multiplexed channels endpoint.
    ///
    /// The kernel id is percent-encoded as a single path segment.
    pub fn kernel_channels_url(&self, kernel_id: &str) -> Result<Url> {
        let mut url = self.ws_base_url()?;
        url.path_segments_mut()
            .map_err(|_| {
                KernelwireError::InvalidUrl(format!("{} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "kernels", kernel_id, "channels"]);
        Ok(url)
    }

    /// Value of the `Authorization` header.
    ///
    /// A bare token is sent as `token <value>`; a value that already names a
    /// scheme (`Bearer ...`, `token ...`) is sent unchanged.
    pub fn authorization_header(&self) -> Option<String> {
        let token = self.token.as_deref()?.trim();
        if token.contains(' ') {
            Some(token.to_string())
        } else {
            Some(format!("token {}", token))
        }
    }
}

/// Configuration for one kernel channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Outbound message queue capacity.
    pub channel_capacity: usize,
    /// Timeout used by `execute` calls that don't pass one.
    pub default_timeout: Duration,
    /// Content flags for `execute_request`.
    pub execute_options: ExecuteOptions,
    /// Username stamped into message headers.
    pub username: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            default_timeout: DEFAULT_EXECUTE_TIMEOUT,
            execute_options: ExecuteOptions::default(),
            username: String::new(),
        }
    }
}

impl ChannelConfig {
    /// Channel defaults with the username taken from a client config.
    pub fn from_client(client: &ClientConfig) -> Self {
        Self {
            username: client.username().to_string(),
            ..Self::default()
        }
    }
}
