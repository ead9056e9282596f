//! Request/response client and fire-and-forget sender.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::correlation::CorrelationTable;
use crate::envelope::{CorrelationId, Envelope};
use crate::error::{BridgeError, BridgeResult};
use crate::transport::Transport;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Issues correlated requests and uncorrelated notifications to the peer.
#[derive(Clone)]
pub struct RequestClient {
    table: Arc<CorrelationTable>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

/// Removes the table entry when the request future ends, however it ends.
struct PendingGuard {
    table: Arc<CorrelationTable>,
    id: CorrelationId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.table.expire(&self.id) {
            debug!(correlation_id = %self.id, "request abandoned before completion");
        }
    }
}

impl RequestClient {
    pub fn new(table: Arc<CorrelationTable>, transport: Arc<dyn Transport>) -> Self {
        Self {
            table,
            transport,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn table(&self) -> &Arc<CorrelationTable> {
        &self.table
    }

    /// Sends a correlated request and waits for its reply or the default deadline.
    pub async fn request(&self, kind: &str, payload: Option<Value>) -> BridgeResult<Option<Value>> {
        self.request_with_timeout(kind, payload, self.timeout).await
    }

    /// Sends a correlated request with a per-call deadline.
    ///
    /// Exactly one outcome is produced: the reply payload, the peer's error as
    /// [`BridgeError::Remote`], or [`BridgeError::Timeout`]. The entry is
    /// removed from the table before the timeout is reported, so a late reply
    /// is dropped by the dispatcher.
    pub async fn request_with_timeout(
        &self,
        kind: &str,
        payload: Option<Value>,
        timeout: Duration,
    ) -> BridgeResult<Option<Value>> {
        let (id, mut rx) = self.table.register(kind, timeout);
        let _guard = PendingGuard {
            table: Arc::clone(&self.table),
            id: id.clone(),
        };

        let envelope = Envelope::request(kind, payload, id.clone());
        self.transport.post(&envelope)?;

        let waited = tokio::time::timeout(timeout, &mut rx).await;
        match waited {
            Ok(Ok(outcome)) => outcome.map_err(BridgeError::Remote),
            Ok(Err(_)) => Err(BridgeError::Closed),
            Err(_) => {
                if self.table.expire(&id) {
                    warn!(
                        correlation_id = %id,
                        kind,
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "request timed out"
                    );
                    return Err(BridgeError::Timeout {
                        correlation_id: id,
                        kind: kind.to_string(),
                        after: timeout,
                    });
                }
                // A reply removed the entry at the deadline; it wins. Its
                // sender either delivers or drops right after the removal.
                match rx.await {
                    Ok(outcome) => outcome.map_err(BridgeError::Remote),
                    Err(_) => Err(BridgeError::Closed),
                }
            }
        }
    }

    /// Like [`request`](Self::request), deserializing the success payload.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        kind: &str,
        payload: Option<Value>,
    ) -> BridgeResult<T> {
        let value = self.request(kind, payload).await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    /// Fire-and-forget: no correlation id, no table entry, no completion.
    pub fn notify(&self, kind: &str, payload: Option<Value>) -> BridgeResult<()> {
        debug!(kind, "posting notification");
        self.transport.post(&Envelope::notification(kind, payload))
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("pending", &self.table.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
