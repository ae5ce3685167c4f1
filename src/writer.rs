//! Dedicated writer task for outbound WebSocket messages.
//!
//! Concurrent `execute` callers never touch the socket directly. They hand
//! encoded envelopes to a writer task through an mpsc channel; the task owns
//! the sink half of the socket and writes each envelope as one text frame.
//!
//! # Architecture
//!
//! ```text
//! execute 1 ─┐
//! execute 2 ─┼─► mpsc::Sender<OutboundMessage> ─► Writer Task ─► WebSocket sink
//! execute N ─┘
//! ```
//!
//! Ready messages are batched: each one is fed to the sink and the sink is
//! flushed once per batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::{KernelwireError, Result};

/// Maximum messages to batch before a flush.
const MAX_BATCH_SIZE: usize = 64;

/// A message queued for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// One encoded envelope.
    Text(String),
    /// Send a close frame and stop the writer.
    Close,
}

/// Handle for sending messages to the writer task.
///
/// This is cheaply cloneable and can be shared across concurrent callers.
#[derive(Clone, Debug)]
pub struct WriterHandle {
    /// Channel sender for messages.
    tx: mpsc::Sender<OutboundMessage>,
    /// Messages queued but not yet flushed.
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    fn new(tx: mpsc::Sender<OutboundMessage>, pending: Arc<AtomicUsize>) -> Self {
        Self { tx, pending }
    }

    /// Queue an encoded envelope.
    ///
    /// Waits while the queue is full. Fails with
    /// [`KernelwireError::Transport`] once the writer task has stopped.
    pub async fn send_text(&self, text: String) -> Result<()> {
        self.send(OutboundMessage::Text(text)).await
    }

    /// Queue a message.
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(message).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            KernelwireError::Transport("channel is closed".to_string())
        })
    }

    /// Ask the writer to send a close frame and stop.
    pub async fn close(&self) -> Result<()> {
        self.send(OutboundMessage::Close).await
    }

    /// Get current queued message count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Check if the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending messages.
///
/// # Arguments
///
/// * `sink` - The sink half of the WebSocket
/// * `capacity` - Outbound queue capacity
///
/// # Returns
///
/// A tuple of `(WriterHandle, JoinHandle)`. The task ends with `Ok` after a
/// close request or when every handle is dropped, and with `Err` on a write
/// failure.
pub fn spawn_writer_task<Si>(sink: Si, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    Si: Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(tx, pending.clone());
    let task = tokio::spawn(writer_loop(rx, sink, pending));

    (handle, task)
}

/// Main writer loop - receives messages and writes them to the sink.
async fn writer_loop<Si>(
    mut rx: mpsc::Receiver<OutboundMessage>,
    mut sink: Si,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(m) => m,
            None => {
                // Every handle dropped, clean shutdown
                tracing::debug!("writer channel closed, closing socket");
                let _ = sink.close().await;
                return Ok(());
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        let closing = write_batch(&mut sink, batch).await?;
        pending.fetch_sub(batch_size, Ordering::Release);

        if closing {
            tracing::debug!("writer closing socket on request");
            // The peer may already be gone; a failed close is not an error here.
            if let Err(e) = sink.close().await {
                tracing::debug!("socket close failed: {}", e);
            }
            return Ok(());
        }
    }
}

/// Feed a batch to the sink and flush once. Returns true if the batch
/// contained a close request; messages after it are dropped.
async fn write_batch<Si>(sink: &mut Si, batch: Vec<OutboundMessage>) -> Result<bool>
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    for message in batch {
        match message {
            OutboundMessage::Text(text) => {
                tracing::trace!(bytes = text.len(), "writing envelope");
                sink.feed(Message::text(text)).await?;
            }
            OutboundMessage::Close => {
                sink.flush().await?;
                return Ok(true);
            }
        }
    }

    sink.flush().await?;
    Ok(false)
}
