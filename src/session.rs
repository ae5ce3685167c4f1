//! Kernel session: a [`KernelChannel`] opened against a Jupyter Server.

use std::time::Duration;

use crate::channel::KernelChannel;
use crate::config::{ChannelConfig, ClientConfig};
use crate::error::Result;
use crate::output::Output;
use crate::protocol::ExecuteOptions;
use crate::transport::connect;

/// An open connection to one kernel on a server.
///
/// ```ignore
/// let config = ClientConfig::from_env()?;
/// let session = KernelSession::open(&config, &kernel_id).await?;
/// let outputs = session.execute("print(1)", None).await?;
/// session.close().await?;
/// ```
#[derive(Debug)]
pub struct KernelSession {
    kernel_id: String,
    channel: KernelChannel,
}

impl KernelSession {
    /// Connect to `{ws_base}/api/kernels/{kernel_id}/channels`.
    pub async fn open(config: &ClientConfig, kernel_id: &str) -> Result<Self> {
        Self::open_with(config, kernel_id, ChannelConfig::from_client(config)).await
    }

    /// Connect with explicit channel settings.
    pub async fn open_with(
        config: &ClientConfig,
        kernel_id: &str,
        channel_config: ChannelConfig,
    ) -> Result<Self> {
        let url = config.kernel_channels_url(kernel_id)?;
        let socket = connect(&url, config).await?;

        tracing::info!(kernel_id, "kernel session open");
        Ok(Self {
            kernel_id: kernel_id.to_string(),
            channel: KernelChannel::spawn(socket, channel_config),
        })
    }

    /// Execute code; `None` uses the channel's default timeout.
    pub async fn execute(&self, code: &str, timeout: Option<Duration>) -> Result<Vec<Output>> {
        self.channel.execute(code, timeout).await
    }

    /// Execute code with explicit request flags.
    pub async fn execute_with(
        &self,
        code: &str,
        options: &ExecuteOptions,
        timeout: Option<Duration>,
    ) -> Result<Vec<Output>> {
        self.channel.execute_with(code, options, timeout).await
    }

    pub fn kernel_id(&self) -> &str {
        &self.kernel_id
    }

    /// Outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.channel.pending_count()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Cancel outstanding requests and close the connection.
    pub async fn close(&self) -> Result<()> {
        tracing::info!(kernel_id = %self.kernel_id, "closing kernel session");
        self.channel.close().await
    }
}
