//! Registry of outstanding requests keyed by request message id.
//!
//! Owned by the engine loop alone, so it needs no locking.

use std::collections::HashMap;

use tokio::time::Instant;

use super::pending::PendingRequest;
use crate::error::KernelwireError;

/// Outstanding requests by message id.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    requests: HashMap<String, PendingRequest>,
}

impl PendingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
        }
    }

    /// Register a request.
    ///
    /// A second request under an id that is already outstanding is rejected
    /// with a protocol error; the first one is left untouched. Returns true if
    /// the request was registered.
    pub fn register(&mut self, pending: PendingRequest) -> bool {
        if self.requests.contains_key(pending.msg_id()) {
            let msg_id = pending.msg_id().to_string();
            tracing::warn!(%msg_id, "duplicate request id, rejecting");
            pending.reject(KernelwireError::Protocol(format!(
                "request id {} is already outstanding",
                msg_id
            )));
            return false;
        }

        self.requests.insert(pending.msg_id().to_string(), pending);
        true
    }

    /// Get a request by id.
    pub fn get_mut(&mut self, msg_id: &str) -> Option<&mut PendingRequest> {
        self.requests.get_mut(msg_id)
    }

    /// Check if an id is outstanding.
    pub fn contains(&self, msg_id: &str) -> bool {
        self.requests.contains_key(msg_id)
    }

    /// Remove a request by id.
    pub fn remove(&mut self, msg_id: &str) -> Option<PendingRequest> {
        self.requests.remove(msg_id)
    }

    /// Earliest deadline among outstanding requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.requests.values().map(PendingRequest::deadline).min()
    }

    /// Remove and return every request whose deadline has passed.
    pub fn take_expired(&mut self, now: Instant) -> Vec<PendingRequest> {
        self.take_where(|p| p.is_expired(now))
    }

    /// Remove and return every request whose caller stopped waiting.
    pub fn take_abandoned(&mut self) -> Vec<PendingRequest> {
        self.take_where(PendingRequest::is_abandoned)
    }

    /// Remove and return all requests.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.requests.drain().map(|(_, p)| p).collect()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn take_where<F>(&mut self, mut predicate: F) -> Vec<PendingRequest>
    where
        F: FnMut(&PendingRequest) -> bool,
    {
        let ids: Vec<String> = self
            .requests
            .iter()
            .filter(|(_, p)| predicate(p))
            .map(|(id, _)| id.clone())
            .collect();

        ids.iter()
            .filter_map(|id| self.requests.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_and_remove() {
        let mut registry = PendingRegistry::new();
        let (pending, _rx) = PendingRequest::channel("a", Duration::from_secs(1));

        assert!(registry.register(pending));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("a"));

        assert!(registry.remove("a").is_some());
        assert!(registry.is_empty());
        assert!(registry.remove("a").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let mut registry = PendingRegistry::new();
        let (first, mut first_rx) = PendingRequest::channel("dup", Duration::from_secs(1));
        let (second, second_rx) = PendingRequest::channel("dup", Duration::from_secs(1));

        assert!(registry.register(first));
        assert!(!registry.register(second));
        assert_eq!(registry.len(), 1);

        assert!(matches!(
            second_rx.await.unwrap(),
            Err(KernelwireError::Protocol(_))
        ));
        // The first request is still waiting
        assert!(first_rx.try_recv().is_err());
        assert!(registry.contains("dup"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_deadline_and_expiry() {
        let mut registry = PendingRegistry::new();
        let start = Instant::now();
        let (short, _a) = PendingRequest::channel("short", Duration::from_secs(1));
        let (long, _b) = PendingRequest::channel("long", Duration::from_secs(5));
        registry.register(short);
        registry.register(long);

        assert_eq!(registry.next_deadline(), Some(start + Duration::from_secs(1)));

        assert!(registry
            .take_expired(start + Duration::from_millis(999))
            .is_empty());

        let expired = registry.take_expired(start + Duration::from_secs(1));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].msg_id(), "short");
        assert_eq!(registry.next_deadline(), Some(start + Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_take_abandoned() {
        let mut registry = PendingRegistry::new();
        let (kept, _kept_rx) = PendingRequest::channel("kept", Duration::from_secs(1));
        let (gone, gone_rx) = PendingRequest::channel("gone", Duration::from_secs(1));
        registry.register(kept);
        registry.register(gone);
        drop(gone_rx);

        let abandoned = registry.take_abandoned();
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].msg_id(), "gone");
        assert!(registry.contains("kept"));
    }

    #[tokio::test]
    async fn test_drain() {
        let mut registry = PendingRegistry::new();
        for id in ["a", "b", "c"] {
            let (p, _rx) = PendingRequest::channel(id, Duration::from_secs(1));
            registry.register(p);
        }

        assert_eq!(registry.drain().len(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.next_deadline(), None);
    }
}
