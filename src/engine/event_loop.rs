//! The engine task: single reader of the inbound stream and sole owner of
//! the correlation state.
//!
//! ```text
//! callers ──Command──► ┌────────────┐ ◄── inbound frames (WebSocket stream)
//!                      │ run_engine │ ◄── earliest deadline (sleep_until)
//!                      └────────────┘ ◄── writer task exit
//! ```
//!
//! Commands are polled before inbound frames, so a registration queued
//! before its envelope was written is always applied before any reply to it
//! can be dispatched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::FusedFuture;
use futures_util::{FutureExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::{Correlator, DispatchOutcome, PendingRequest};
use crate::codec::JsonCodec;
use crate::error::{KernelwireError, Result};
use crate::protocol::Envelope;
use crate::writer::WriterHandle;

/// How long shutdown waits for the writer to flush its close frame.
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Instruction for the engine task.
#[derive(Debug)]
pub enum Command {
    /// Track a request before its envelope is sent.
    Register { pending: PendingRequest },
    /// Forget a request whose envelope could not be sent.
    Abandon { msg_id: String },
    /// Cancel everything, close the socket, and stop.
    Shutdown { done: oneshot::Sender<()> },
}

/// Caller side of the engine task.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
    pending: Arc<AtomicUsize>,
}

/// Engine side of an [`EngineHandle`].
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
    pending: Arc<AtomicUsize>,
}

impl EngineHandle {
    /// Create a handle and the receiver to pass to [`run_engine`].
    pub fn channel() -> (Self, CommandReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                pending: pending.clone(),
            },
            CommandReceiver { rx, pending },
        )
    }

    /// Register a request with the engine.
    pub fn register(&self, pending: PendingRequest) -> Result<()> {
        self.tx
            .send(Command::Register { pending })
            .map_err(|_| KernelwireError::Transport("channel is closed".to_string()))
    }

    /// Drop a registration.
    pub fn abandon(&self, msg_id: impl Into<String>) {
        let _ = self.tx.send(Command::Abandon {
            msg_id: msg_id.into(),
        });
    }

    /// Stop the engine and wait until every request has been resolved.
    ///
    /// Returns immediately if the engine has already stopped.
    pub async fn shutdown(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).is_ok() {
            let _ = wait.await;
        }
    }

    /// Ask the engine to stop without waiting.
    pub fn request_shutdown(&self) {
        let (done, _) = oneshot::channel();
        let _ = self.tx.send(Command::Shutdown { done });
    }

    /// Outstanding requests. A request's own result is never visible before
    /// its removal from this count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Check if the engine task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Run the engine until shutdown, close, end of stream, or a transport
/// failure. Every outstanding request is cancelled before this returns.
pub async fn run_engine<St>(
    mut inbound: St,
    mut commands: CommandReceiver,
    writer: WriterHandle,
    writer_task: JoinHandle<Result<()>>,
) -> Result<()>
where
    St: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    let mut correlator = Correlator::with_gauge(commands.pending.clone());
    let mut writer_task = writer_task.fuse();
    let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();

    let exit = loop {
        let deadline = correlator.next_deadline();

        tokio::select! {
            biased;

            command = commands.rx.recv() => match command {
                Some(Command::Register { pending }) => {
                    correlator.register(pending);
                    correlator.sweep(Instant::now());
                }
                Some(Command::Abandon { msg_id }) => {
                    if correlator.abandon(&msg_id) {
                        tracing::debug!(%msg_id, "request abandoned before send");
                    }
                }
                Some(Command::Shutdown { done }) => {
                    tracing::debug!("engine shutdown requested");
                    waiters.push(done);
                    break Ok(());
                }
                None => {
                    tracing::debug!("every engine handle dropped");
                    break Ok(());
                }
            },

            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    dispatch_text(&mut correlator, text.as_str());
                }
                Some(Ok(Message::Binary(data))) => match JsonCodec::decode_slice(&data) {
                    Ok(envelope) => dispatch(&mut correlator, &envelope),
                    Err(_) => tracing::warn!(bytes = data.len(), "dropping binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "peer closed the channel");
                    break Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("channel read failed: {}", e);
                    break Err(KernelwireError::Transport(e.to_string()));
                }
                None => {
                    tracing::debug!("inbound stream ended");
                    break Ok(());
                }
            },

            joined = &mut writer_task, if !writer_task.is_terminated() => {
                break match joined {
                    Ok(Ok(())) => {
                        tracing::debug!("writer stopped");
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        tracing::error!("channel write failed: {}", e);
                        Err(KernelwireError::Transport(e.to_string()))
                    }
                    Err(e) => Err(KernelwireError::Transport(format!("writer task failed: {}", e))),
                };
            }

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                correlator.sweep(Instant::now());
            }
        }
    };

    // Nothing new can be registered from here on.
    commands.rx.close();
    while let Ok(command) = commands.rx.try_recv() {
        match command {
            Command::Register { pending } => {
                pending.cancel();
            }
            Command::Shutdown { done } => waiters.push(done),
            Command::Abandon { .. } => {}
        }
    }

    let cancelled = correlator.cancel_all();
    if cancelled > 0 {
        tracing::debug!(cancelled, "cancelled outstanding requests");
    }

    if !writer_task.is_terminated() {
        let stopped = tokio::time::timeout(WRITER_SHUTDOWN_GRACE, async {
            let _ = writer.close().await;
            let _ = (&mut writer_task).await;
        })
        .await;
        if stopped.is_err() {
            tracing::warn!("writer did not stop in time");
        }
    }

    for done in waiters {
        let _ = done.send(());
    }

    exit
}

fn dispatch_text(correlator: &mut Correlator, text: &str) {
    tracing::trace!(bytes = text.len(), "inbound frame");

    let envelope = match JsonCodec::decode(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("dropping malformed envelope: {}", e);
            return;
        }
    };

    dispatch(correlator, &envelope);
}

fn dispatch(correlator: &mut Correlator, envelope: &Envelope) {
    let outcome = correlator.on_envelope(envelope);
    if outcome != DispatchOutcome::Discarded {
        tracing::trace!(
            msg_type = envelope.msg_type(),
            parent_id = envelope.parent_msg_id(),
            ?outcome,
            "dispatched"
        );
    }
}
