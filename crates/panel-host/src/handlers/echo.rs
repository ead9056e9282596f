use async_trait::async_trait;
use panel_bridge::{Envelope, HandlerResult, Reply, RequestHandler, Responder};
use serde_json::{json, Value};

use super::{PONG, TEST_RESPONSE};

/// Liveness check.
#[derive(Debug, Clone, Copy)]
pub struct Ping;

#[async_trait]
impl RequestHandler for Ping {
    async fn handle(&self, _request: &Envelope, _responder: &Responder) -> HandlerResult {
        Ok(Some(Reply::new(PONG, json!("pong"))))
    }
}

/// Answers `testFromWebview` with a fixed message and the request payload.
#[derive(Debug, Clone, Copy)]
pub struct TestEcho;

#[async_trait]
impl RequestHandler for TestEcho {
    async fn handle(&self, request: &Envelope, _responder: &Responder) -> HandlerResult {
        Ok(Some(Reply::new(
            TEST_RESPONSE,
            json!({
                "message": "Response from Extension to testFromWebview!",
                "originalPayload": request.payload.clone().unwrap_or(Value::Null),
            }),
        )))
    }
}
