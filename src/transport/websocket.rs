//! WebSocket connection to a kernel's channels endpoint.
//!
//! # Example
//!
//! ```ignore
//! use kernelwire_client::config::ClientConfig;
//! use kernelwire_client::transport::connect;
//!
//! let config = ClientConfig::new("http://localhost:8888")?.with_token("secret");
//! let url = config.kernel_channels_url("0d6a4c3e")?;
//! let socket = connect(&url, &config).await?;
//! ```

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{KernelwireError, Result};

/// A connected kernel channel socket.
pub type KernelSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the WebSocket, sending the configured `Authorization` header.
///
/// # Errors
///
/// Returns [`KernelwireError::Connection`] if the handshake fails and
/// [`KernelwireError::Config`] if the token is not a valid header value.
pub async fn connect(url: &Url, config: &ClientConfig) -> Result<KernelSocket> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| KernelwireError::InvalidUrl(format!("{}: {}", url, e)))?;

    if let Some(auth) = config.authorization_header() {
        let value = HeaderValue::from_str(&auth)
            .map_err(|_| KernelwireError::Config("token is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    tracing::debug!(%url, "opening kernel channel");

    let (socket, response) = connect_async(request)
        .await
        .map_err(|e| KernelwireError::Connection(format!("{}: {}", url, e)))?;

    tracing::debug!(status = %response.status(), "kernel channel open");
    Ok(socket)
}
