//! Bridge errors.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::envelope::CorrelationId;

/// Errors surfaced by the messaging bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No reply arrived before the request deadline.
    #[error("request {correlation_id} (type: {kind}) timed out after {}ms", after.as_millis())]
    Timeout {
        correlation_id: CorrelationId,
        kind: String,
        after: Duration,
    },

    /// The peer answered with a failure reply; the `error` field is kept verbatim.
    #[error("peer reported failure: {0}")]
    Remote(Value),

    /// The channel refused the outgoing message.
    #[error("transport error: {0}")]
    Transport(String),

    /// The bridge shut down before the request completed.
    #[error("bridge closed before the request completed")]
    Closed,

    /// Inbound text was not a valid envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// A success payload did not have the expected shape.
    #[error("unexpected payload shape: {0}")]
    Payload(#[from] serde_json::Error),
}

impl BridgeError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The peer's error value, for failure replies.
    #[must_use]
    pub fn remote(&self) -> Option<&Value> {
        match self {
            Self::Remote(value) => Some(value),
            _ => None,
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
