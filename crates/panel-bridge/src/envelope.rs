//! Wire envelope shared by both peers.
//! - Envelope: type tag + optional payload/correlationId/error
//! - CorrelationId: opaque request identity echoed by replies

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};

/// Opaque token linking a request to its reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds `<type>-<unix millis>-<base36 seq>`.
    #[must_use]
    pub fn generate(kind: &str, seq: u64) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self(format!("{kind}-{millis}-{}", base36(seq)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// One message exchanged between the peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Envelope {
    /// Uncorrelated message; no reply is expected.
    #[must_use]
    pub fn notification(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
            correlation_id: None,
            error: None,
        }
    }

    #[must_use]
    pub fn request(kind: impl Into<String>, payload: Option<Value>, id: CorrelationId) -> Self {
        Self {
            kind: kind.into(),
            payload,
            correlation_id: Some(id),
            error: None,
        }
    }

    /// Success reply echoing the request's correlation id.
    #[must_use]
    pub fn reply(kind: impl Into<String>, id: CorrelationId, payload: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
            correlation_id: Some(id),
            error: None,
        }
    }

    /// Failure reply echoing the request's correlation id.
    #[must_use]
    pub fn failure(kind: impl Into<String>, id: CorrelationId, error: Value) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            correlation_id: Some(id),
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.correlation_id.is_none()
    }

    /// Interprets the envelope as a reply: `error` wins over `payload`, and
    /// a reply carrying neither is a success with no result.
    #[must_use]
    pub fn outcome(self) -> Result<Option<Value>, Value> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.payload),
        }
    }

    /// Parses one inbound message. A message without a string `type` is rejected.
    pub fn from_json(text: &str) -> BridgeResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| BridgeError::Malformed(err.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> BridgeResult<Self> {
        match value.get("type") {
            Some(Value::String(_)) => {}
            Some(_) => return Err(BridgeError::Malformed("`type` must be a string".into())),
            None => return Err(BridgeError::Malformed("missing `type`".into())),
        }
        serde_json::from_value(value).map_err(|err| BridgeError::Malformed(err.to_string()))
    }

    pub fn to_json(&self) -> BridgeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
