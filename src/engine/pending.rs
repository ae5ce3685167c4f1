//! Pending request: the per-execution accumulator and its state machine.
//!
//! ```text
//! AwaitingBusy ──busy──► Running ──idle──► IdleReceived
//!      │                    │
//!      └──── deadline / close ────► TimedOut / Cancelled
//! ```
//!
//! Resolution consumes the request, so nothing can touch it after it reaches
//! a terminal state.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{KernelwireError, Result};
use crate::output::Output;

/// Channel back to the waiting `execute` caller.
pub type Responder = oneshot::Sender<Result<Vec<Output>>>;

/// Execution state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Sent, kernel hasn't reported busy yet.
    AwaitingBusy,
    /// Kernel reported busy for this request.
    Running,
    /// Kernel reported idle; outputs delivered.
    IdleReceived,
    /// Channel closed before idle.
    Cancelled,
    /// Deadline elapsed before idle.
    TimedOut,
}

impl RequestState {
    /// Check if no further transitions are possible.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::IdleReceived | Self::Cancelled | Self::TimedOut)
    }
}

/// One outstanding execution.
#[derive(Debug)]
pub struct PendingRequest {
    msg_id: String,
    created_at: Instant,
    timeout: Duration,
    deadline: Instant,
    state: RequestState,
    outputs: Vec<Output>,
    responder: Responder,
}

/// Roughly 30 years; the horizon used when a timeout overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

impl PendingRequest {
    /// Create a request whose deadline is `timeout` from now.
    pub fn new(msg_id: impl Into<String>, timeout: Duration, responder: Responder) -> Self {
        let created_at = Instant::now();
        Self {
            msg_id: msg_id.into(),
            created_at,
            timeout,
            deadline: deadline_after(created_at, timeout),
            state: RequestState::AwaitingBusy,
            outputs: Vec::new(),
            responder,
        }
    }

    /// Create a request and the receiver its caller waits on.
    pub fn channel(
        msg_id: impl Into<String>,
        timeout: Duration,
    ) -> (Self, oneshot::Receiver<Result<Vec<Output>>>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(msg_id, timeout, tx), rx)
    }

    #[inline]
    pub fn msg_id(&self) -> &str {
        &self.msg_id
    }

    #[inline]
    pub fn state(&self) -> RequestState {
        self.state
    }

    #[inline]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Outputs accumulated so far, in arrival order.
    #[inline]
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Kernel reported busy. Idempotent once running.
    pub fn mark_busy(&mut self) {
        if self.state == RequestState::AwaitingBusy {
            self.state = RequestState::Running;
        }
    }

    /// Append an output fragment.
    pub fn push_output(&mut self, output: Output) {
        self.outputs.push(output);
    }

    /// Check if the deadline has passed.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Check if the caller stopped waiting.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }

    /// Idle received: hand the outputs to the caller.
    pub fn complete(self) -> RequestState {
        Self::deliver(self.responder, Ok(self.outputs));
        RequestState::IdleReceived
    }

    /// Deadline elapsed: fail the caller with the partial outputs attached.
    pub fn time_out(self) -> RequestState {
        let err = KernelwireError::ExecutionTimeout {
            msg_id: self.msg_id.clone(),
            timeout: self.timeout,
            partial_outputs: self.outputs,
        };
        Self::deliver(self.responder, Err(err));
        RequestState::TimedOut
    }

    /// Channel closed: fail the caller with `Cancelled`.
    pub fn cancel(self) -> RequestState {
        let err = KernelwireError::Cancelled {
            msg_id: self.msg_id.clone(),
        };
        Self::deliver(self.responder, Err(err));
        RequestState::Cancelled
    }

    /// Fail the caller with an arbitrary error (e.g. a rejected registration).
    pub fn reject(self, err: KernelwireError) {
        Self::deliver(self.responder, Err(err));
    }

    fn deliver(responder: Responder, result: Result<Vec<Output>>) {
        // The caller may have given up; that's fine.
        let _ = responder.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(text: &str) -> Output {
        Output::Stream {
            name: "stdout".into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (mut pending, rx) = PendingRequest::channel("r1", Duration::from_secs(5));
        assert_eq!(pending.state(), RequestState::AwaitingBusy);

        pending.mark_busy();
        assert_eq!(pending.state(), RequestState::Running);
        pending.mark_busy();
        assert_eq!(pending.state(), RequestState::Running);

        pending.push_output(stream("a"));
        pending.push_output(stream("b"));
        assert_eq!(pending.complete(), RequestState::IdleReceived);

        let outputs = rx.await.unwrap().unwrap();
        assert_eq!(outputs, vec![stream("a"), stream("b")]);
    }

    #[tokio::test]
    async fn test_huge_timeout_saturates_deadline() {
        let (pending, _rx) = PendingRequest::channel("r1", Duration::MAX);
        assert!(pending.deadline() > pending.created_at() + Duration::from_secs(86400 * 365));
        assert!(!pending.is_expired(Instant::now()));
    }

    #[tokio::test]
    async fn test_time_out_carries_partial_outputs() {
        let (mut pending, rx) = PendingRequest::channel("r1", Duration::from_millis(100));
        pending.push_output(stream("partial"));

        assert_eq!(pending.time_out(), RequestState::TimedOut);

        match rx.await.unwrap() {
            Err(KernelwireError::ExecutionTimeout {
                msg_id,
                timeout,
                partial_outputs,
            }) => {
                assert_eq!(msg_id, "r1");
                assert_eq!(timeout, Duration::from_millis(100));
                assert_eq!(partial_outputs, vec![stream("partial")]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel() {
        let (pending, rx) = PendingRequest::channel("r1", Duration::from_secs(1));
        assert_eq!(pending.cancel(), RequestState::Cancelled);
        assert!(matches!(
            rx.await.unwrap(),
            Err(KernelwireError::Cancelled { ref msg_id }) if msg_id == "r1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_never_early() {
        let (pending, _rx) = PendingRequest::channel("r1", Duration::from_secs(2));
        let start = Instant::now();

        assert!(!pending.is_expired(start));
        assert!(!pending.is_expired(start + Duration::from_millis(1999)));
        assert!(pending.is_expired(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_abandoned_when_receiver_dropped() {
        let (pending, rx) = PendingRequest::channel("r1", Duration::from_secs(1));
        assert!(!pending.is_abandoned());
        drop(rx);
        assert!(pending.is_abandoned());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RequestState::AwaitingBusy.is_terminal());
        assert!(!RequestState::Running.is_terminal());
        assert!(RequestState::IdleReceived.is_terminal());
        assert!(RequestState::Cancelled.is_terminal());
        assert!(RequestState::TimedOut.is_terminal());
    }
}
