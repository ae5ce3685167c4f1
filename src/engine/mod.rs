//! Correlation engine.
//!
//! Demultiplexes inbound envelopes onto outstanding requests by
//! `parent_header.msg_id` and drives each request's state machine. The
//! [`Correlator`] is plain synchronous state; [`run_engine`] is the task that
//! owns it and is the only place it is ever mutated.

mod event_loop;
mod pending;
mod registry;

pub use event_loop::{run_engine, Command, CommandReceiver, EngineHandle};
pub use pending::{PendingRequest, RequestState, Responder};
pub use registry::PendingRegistry;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::time::Instant;

use crate::output::Output;
use crate::protocol::{msg_type, Channel, Envelope, ExecutionState, StatusContent};

/// What the correlator did with an inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No outstanding request matches the parent id.
    Discarded,
    /// Request moved to running.
    Busy,
    /// Output appended to the request.
    Appended,
    /// Idle received; request resolved and removed.
    Resolved,
    /// Matched a request but carries nothing it tracks.
    Ignored,
}

/// Request/response correlation state.
///
/// The outstanding count is mirrored into a shared gauge. The gauge is
/// updated before any removed request is answered, so a caller that has its
/// result never reads a count that still includes its own request.
#[derive(Debug, Default)]
pub struct Correlator {
    registry: PendingRegistry,
    gauge: Arc<AtomicUsize>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlator that publishes its outstanding count into `gauge`.
    pub fn with_gauge(gauge: Arc<AtomicUsize>) -> Self {
        gauge.store(0, Ordering::Release);
        Self {
            registry: PendingRegistry::new(),
            gauge,
        }
    }

    fn publish(&self) {
        self.gauge.store(self.registry.len(), Ordering::Release);
    }

    /// Register a request. Returns false if its id was already outstanding.
    pub fn register(&mut self, pending: PendingRequest) -> bool {
        tracing::trace!(msg_id = pending.msg_id(), "registering request");
        let registered = self.registry.register(pending);
        self.publish();
        registered
    }

    /// Route one inbound envelope.
    pub fn on_envelope(&mut self, envelope: &Envelope) -> DispatchOutcome {
        let Some(parent_id) = envelope.parent_msg_id() else {
            tracing::debug!(
                msg_type = envelope.msg_type(),
                "discarding envelope without parent"
            );
            return DispatchOutcome::Discarded;
        };

        let Some(pending) = self.registry.get_mut(parent_id) else {
            tracing::debug!(
                msg_type = envelope.msg_type(),
                parent_id,
                "discarding envelope for unknown request"
            );
            return DispatchOutcome::Discarded;
        };

        // Status and outputs only count on iopub. A frame without a channel
        // field is treated as iopub.
        if envelope.channel.is_some_and(|c| c != Channel::Iopub) {
            return DispatchOutcome::Ignored;
        }

        match envelope.msg_type() {
            msg_type::STATUS => {
                let status = match envelope.content_as::<StatusContent>() {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::warn!(parent_id, "bad status content: {}", e);
                        return DispatchOutcome::Ignored;
                    }
                };

                match status.execution_state {
                    ExecutionState::Busy => {
                        pending.mark_busy();
                        DispatchOutcome::Busy
                    }
                    ExecutionState::Idle => {
                        if let Some(pending) = self.registry.remove(parent_id) {
                            self.publish();
                            tracing::debug!(
                                msg_id = parent_id,
                                outputs = pending.outputs().len(),
                                "request complete"
                            );
                            pending.complete();
                        }
                        DispatchOutcome::Resolved
                    }
                    _ => DispatchOutcome::Ignored,
                }
            }
            t if msg_type::is_output(t) => {
                pending.push_output(Output::from_envelope(envelope));
                DispatchOutcome::Appended
            }
            _ => DispatchOutcome::Ignored,
        }
    }

    /// Time out expired requests and drop abandoned ones.
    ///
    /// Returns the number of requests removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expired = self.registry.take_expired(now);
        let abandoned = self.registry.take_abandoned();
        self.publish();

        let mut removed = expired.len();
        for pending in expired {
            tracing::warn!(
                msg_id = pending.msg_id(),
                state = ?pending.state(),
                outputs = pending.outputs().len(),
                "request timed out"
            );
            pending.time_out();
        }

        removed += abandoned.len();
        for pending in abandoned {
            tracing::debug!(msg_id = pending.msg_id(), "caller gone, dropping request");
        }

        removed
    }

    /// Drop a request whose envelope never reached the wire.
    pub fn abandon(&mut self, msg_id: &str) -> bool {
        let removed = self.registry.remove(msg_id).is_some();
        self.publish();
        removed
    }

    /// Cancel every outstanding request. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let drained = self.registry.drain();
        self.publish();
        let count = drained.len();
        for pending in drained {
            tracing::debug!(msg_id = pending.msg_id(), "cancelling request");
            pending.cancel();
        }
        count
    }

    /// Earliest deadline among outstanding requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.registry.next_deadline()
    }

    /// Number of outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }
}
