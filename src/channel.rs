//! Kernel channel: one multiplexed connection carrying any number of
//! concurrent executions.
//!
//! # Architecture
//!
//! ```text
//! execute ──Register──► engine task ◄── SplitStream (inbound)
//!    │                      │
//!    └──envelope──► writer task ──► SplitSink (outbound)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let channel = KernelChannel::spawn(socket, ChannelConfig::default());
//! let outputs = channel.execute("print(1)", None).await?;
//! channel.close().await?;
//! ```

use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;

use crate::codec::JsonCodec;
use crate::config::ChannelConfig;
use crate::engine::{run_engine, EngineHandle, PendingRequest};
use crate::error::{KernelwireError, Result};
use crate::output::Output;
use crate::protocol::{EnvelopeBuilder, ExecuteOptions};
use crate::writer::{spawn_writer_task, WriterHandle};

/// A live channel to one kernel.
///
/// Dropping the channel stops its tasks and cancels anything outstanding;
/// [`close`](Self::close) does the same and waits for it to finish.
#[derive(Debug)]
pub struct KernelChannel {
    builder: EnvelopeBuilder,
    writer: WriterHandle,
    engine: EngineHandle,
    config: ChannelConfig,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl KernelChannel {
    /// Take over a connected socket and start the writer and engine tasks.
    pub fn spawn<S>(socket: WebSocketStream<S>, config: ChannelConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, inbound) = socket.split();
        let (writer, writer_task) = spawn_writer_task(sink, config.channel_capacity);
        let (engine, commands) = EngineHandle::channel();

        let task = tokio::spawn(run_engine(inbound, commands, writer.clone(), writer_task));

        Self {
            builder: EnvelopeBuilder::new(&config.username),
            writer,
            engine,
            config,
            task: Mutex::new(Some(task)),
        }
    }

    /// Execute code and wait for the kernel to report idle.
    ///
    /// `None` uses the configured default timeout.
    ///
    /// # Errors
    ///
    /// - [`KernelwireError::ExecutionTimeout`] if idle doesn't arrive in time
    /// - [`KernelwireError::Cancelled`] if the channel closes first
    /// - [`KernelwireError::Transport`] if the channel is already closed
    pub async fn execute(&self, code: &str, timeout: Option<Duration>) -> Result<Vec<Output>> {
        self.execute_with(code, &self.config.execute_options, timeout)
            .await
    }

    /// Execute code with explicit request flags.
    pub async fn execute_with(
        &self,
        code: &str,
        options: &ExecuteOptions,
        timeout: Option<Duration>,
    ) -> Result<Vec<Output>> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let envelope = self.builder.execute_request(code, options)?;
        let msg_id = envelope.msg_id().to_string();
        let text = JsonCodec::encode(&envelope)?;

        // Registration is queued ahead of the envelope
        let (pending, rx) = PendingRequest::channel(msg_id.as_str(), timeout);
        self.engine.register(pending)?;

        if let Err(e) = self.writer.send_text(text).await {
            self.engine.abandon(msg_id.as_str());
            return Err(e);
        }
        tracing::debug!(%msg_id, ?timeout, "execute_request sent");

        match rx.await {
            Ok(result) => result,
            // Engine dropped the request without answering
            Err(_) => Err(KernelwireError::Cancelled { msg_id }),
        }
    }

    /// Outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.engine.pending_count()
    }

    /// Check if the channel has stopped.
    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Client session id stamped into every request header.
    pub fn session_id(&self) -> &str {
        self.builder.session()
    }

    /// Cancel outstanding requests, close the socket, and wait for the
    /// engine to stop.
    ///
    /// Returns the error that ended the channel if it had already failed.
    /// Calling it again returns `Ok`.
    pub async fn close(&self) -> Result<()> {
        self.engine.shutdown().await;

        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match task {
            Some(task) => task
                .await
                .map_err(|e| KernelwireError::Transport(format!("engine task failed: {}", e)))?,
            None => Ok(()),
        }
    }
}

impl Drop for KernelChannel {
    fn drop(&mut self) {
        self.engine.request_shutdown();
    }
}
