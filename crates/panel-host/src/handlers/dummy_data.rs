use std::time::Duration;

use async_trait::async_trait;
use panel_bridge::{Envelope, HandlerResult, Reply, ReplyError, RequestHandler, Responder};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::DUMMY_DATA_RESPONSE;

const DUMMY_DATA_ERROR: &str = "dummyDataError";

/// Sample record returned after a simulated fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DummyData {
    pub message: String,
    pub timestamp: String,
    pub random_number: f64,
}

impl DummyData {
    /// Record stamped with `now`; `random_number` is expected in `[0, 1000)`.
    pub fn at(now: OffsetDateTime, random_number: f64) -> Result<Self, time::error::Format> {
        Ok(Self {
            message: format!(
                "This is DUMMY data from the extension, fetched at {:02}:{:02}:{:02}",
                now.hour(),
                now.minute(),
                now.second()
            ),
            timestamp: now.format(&Rfc3339)?,
            random_number,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DummyDataHandler {
    delay: Duration,
}

impl DummyDataHandler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl RequestHandler for DummyDataHandler {
    async fn handle(&self, _request: &Envelope, _responder: &Responder) -> HandlerResult {
        tokio::time::sleep(self.delay).await;
        let data = DummyData::at(OffsetDateTime::now_utc(), rand::random::<f64>() * 1000.0)
            .map_err(|err| ReplyError::message(DUMMY_DATA_ERROR, err.to_string()))?;
        let payload = serde_json::to_value(data)
            .map_err(|err| ReplyError::message(DUMMY_DATA_ERROR, err.to_string()))?;
        Ok(Some(Reply::new(DUMMY_DATA_RESPONSE, payload)))
    }
}
