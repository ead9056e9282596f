//! Correlation table for in-flight requests.
//! - register: allocate a fresh id + completion slot
//! - complete/expire: the only terminal transitions, each removes the entry
//! - close_all: drop every waiter on shutdown

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::envelope::CorrelationId;

/// Result delivered to a waiting requester: the reply payload or the peer's error.
pub type ReplyOutcome = Result<Option<Value>, Value>;

#[derive(Debug)]
struct Pending {
    kind: String,
    deadline: Instant,
    completion: oneshot::Sender<ReplyOutcome>,
}

/// Snapshot of one outstanding request, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInfo {
    pub id: CorrelationId,
    pub kind: String,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: Mutex<HashMap<CorrelationId, Pending>>,
    next_seq: AtomicU64,
}

impl CorrelationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id not currently outstanding and registers its completion slot.
    pub fn register(
        &self,
        kind: &str,
        timeout: Duration,
    ) -> (CorrelationId, oneshot::Receiver<ReplyOutcome>) {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        let id = loop {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let candidate = CorrelationId::generate(kind, seq);
            if !pending.contains_key(&candidate) {
                break candidate;
            }
        };
        pending.insert(
            id.clone(),
            Pending {
                kind: kind.to_string(),
                deadline: Instant::now() + timeout,
                completion: tx,
            },
        );
        debug!(correlation_id = %id, kind, pending = pending.len(), "registered request");
        (id, rx)
    }

    /// Completes and removes the entry. Returns `false` when the id is not
    /// outstanding (never registered, already answered, or expired).
    pub fn complete(&self, id: &CorrelationId, outcome: ReplyOutcome) -> bool {
        let mut pending = self.pending.lock();
        let Some(entry) = pending.remove(id) else {
            return false;
        };
        // Delivered before the lock is released, so a waiter that loses
        // `expire` always finds the outcome. The waiter may already be gone
        // (dropped future); the entry is removed either way.
        let _ = entry.completion.send(outcome);
        true
    }

    /// Removes the entry on deadline. Returns `true` only when this call
    /// performed the terminal transition.
    pub fn expire(&self, id: &CorrelationId) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.pending.lock().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Outstanding requests sorted by id.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingInfo> {
        let mut entries: Vec<PendingInfo> = self
            .pending
            .lock()
            .iter()
            .map(|(id, entry)| PendingInfo {
                id: id.clone(),
                kind: entry.kind.clone(),
                deadline: entry.deadline,
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Drops every outstanding entry; their waiters observe a closed channel.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "dropping outstanding requests");
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(15);

    #[tokio::test]
    async fn complete_fires_once_and_removes_entry() {
        let table = CorrelationTable::new();
        let (id, rx) = table.register("ping", TIMEOUT);
        assert!(table.contains(&id));

        assert!(table.complete(&id, Ok(Some(json!("pong")))));
        assert!(!table.complete(&id, Ok(Some(json!("again")))));
        assert!(table.is_empty());
        assert_eq!(rx.await.unwrap(), Ok(Some(json!("pong"))));
    }

    #[test]
    fn completed_outcome_is_ready_once_expire_loses() {
        let table = CorrelationTable::new();
        let (id, mut rx) = table.register("race", TIMEOUT);
        assert!(table.complete(&id, Ok(Some(json!("won")))));
        assert!(!table.expire(&id));
        assert_eq!(rx.try_recv().unwrap(), Ok(Some(json!("won"))));
    }

    #[tokio::test]
    async fn expire_beats_late_reply() {
        let table = CorrelationTable::new();
        let (id, rx) = table.register("slow", TIMEOUT);
        assert!(table.expire(&id));
        assert!(!table.expire(&id));
        assert!(!table.complete(&id, Ok(None)));
        assert!(rx.await.is_err());
    }

    #[test]
    fn ids_are_unique_per_registration() {
        let table = CorrelationTable::new();
        let (a, _rx_a) = table.register("same", TIMEOUT);
        let (b, _rx_b) = table.register("same", TIMEOUT);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        let kinds: Vec<_> = table.pending().into_iter().map(|info| info.kind).collect();
        assert_eq!(kinds, vec!["same", "same"]);
    }

    #[tokio::test]
    async fn close_all_fails_waiters() {
        let table = CorrelationTable::new();
        let (_id, rx) = table.register("op", TIMEOUT);
        assert_eq!(table.close_all(), 1);
        assert!(table.is_empty());
        assert!(rx.await.is_err());
    }
}
