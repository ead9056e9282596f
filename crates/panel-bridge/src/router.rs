//! Peer request handler: dispatch by type tag, reply with the request's correlation id.
//! - RequestHandler: one handler per message type
//! - Responder: correlated replies (incl. progress) + uncorrelated pushes
//! - RequestRouter::handle: received → dispatched → replied
//! - RequestRouter::serve: concurrent handling on the tokio runtime

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::envelope::{CorrelationId, Envelope};
use crate::error::BridgeResult;
use crate::transport::Transport;

pub const UNKNOWN_MESSAGE_ERROR: &str = "unknownMessageError";
pub const NO_REPLY_ERROR: &str = "noReplyError";

/// Success reply produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub kind: String,
    pub payload: Option<Value>,
}

impl Reply {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload: Some(payload),
        }
    }
}

/// Failure reply produced by a handler; `error` reaches the requester verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyError {
    pub kind: String,
    pub error: Value,
}

impl ReplyError {
    pub fn new(kind: impl Into<String>, error: Value) -> Self {
        Self {
            kind: kind.into(),
            error,
        }
    }

    pub fn message(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, json!({ "message": message.into() }))
    }
}

pub type HandlerResult = Result<Option<Reply>, ReplyError>;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: &Envelope, responder: &Responder) -> HandlerResult;
}

/// Adapts an async closure over the request envelope into a handler.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, request: &Envelope, _responder: &Responder) -> HandlerResult {
        (self.0)(request.clone()).await
    }
}

/// Sends replies for one inbound message.
#[derive(Clone)]
pub struct Responder {
    transport: Arc<dyn Transport>,
    correlation_id: Option<CorrelationId>,
    sent: Arc<AtomicUsize>,
}

impl Responder {
    pub fn new(transport: Arc<dyn Transport>, correlation_id: Option<CorrelationId>) -> Self {
        Self {
            transport,
            correlation_id,
            sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// Replies carrying the request's correlation id. Only the first one is
    /// honored by the requester; later ones serve as progress and are dropped there.
    pub fn send(&self, reply: Reply) -> BridgeResult<()> {
        let envelope = match &self.correlation_id {
            Some(id) => Envelope::reply(reply.kind, id.clone(), reply.payload),
            None => Envelope::notification(reply.kind, reply.payload),
        };
        self.post(&envelope)
    }

    pub fn fail(&self, error: ReplyError) -> BridgeResult<()> {
        let envelope = match &self.correlation_id {
            Some(id) => Envelope::failure(error.kind, id.clone(), error.error),
            None => Envelope {
                kind: error.kind,
                payload: None,
                correlation_id: None,
                error: Some(error.error),
            },
        };
        self.post(&envelope)
    }

    /// Uncorrelated push to the peer; does not count as a reply.
    pub fn notify(&self, kind: &str, payload: Option<Value>) -> BridgeResult<()> {
        self.transport.post(&Envelope::notification(kind, payload))
    }

    #[must_use]
    pub fn replies_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    fn post(&self, envelope: &Envelope) -> BridgeResult<()> {
        self.transport.post(envelope)?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What to do with a correlated request whose type has no handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRequestPolicy {
    /// Fail fast with an `unknownMessageError` reply.
    #[default]
    Reject,
    /// Send nothing; the requester eventually times out.
    Ignore,
}

/// Terminal state of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Replied,
    Failed,
    /// Handled without a reply (notifications, or replies sent via the responder).
    Silent,
    /// Unknown type answered with an error reply.
    Rejected,
    /// Unknown type dropped without a reply.
    Ignored,
}

pub struct RequestRouter {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
    transport: Arc<dyn Transport>,
    policy: UnknownRequestPolicy,
}

impl RequestRouter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            handlers: HashMap::new(),
            transport,
            policy: UnknownRequestPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: UnknownRequestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Registers the handler for a type tag, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<String>, handler: impl RequestHandler + 'static) {
        self.handlers.insert(kind.into(), Arc::new(handler));
    }

    #[must_use]
    pub fn policy(&self) -> UnknownRequestPolicy {
        self.policy
    }

    /// Handles one inbound message to completion.
    pub async fn handle(&self, request: Envelope) -> Handled {
        let responder = Responder::new(Arc::clone(&self.transport), request.correlation_id.clone());
        let Some(handler) = self.handlers.get(&request.kind).cloned() else {
            return self.handle_unknown(&request, &responder);
        };

        debug!(
            kind = %request.kind,
            correlation_id = ?request.correlation_id,
            "dispatching request"
        );
        match handler.handle(&request, &responder).await {
            Ok(Some(reply)) => {
                log_send_error(&request, responder.send(reply));
                Handled::Replied
            }
            Err(error) => {
                log_send_error(&request, responder.fail(error));
                Handled::Failed
            }
            Ok(None) => {
                let owes_reply =
                    responder.correlation_id().is_some() && responder.replies_sent() == 0;
                if owes_reply && self.policy == UnknownRequestPolicy::Reject {
                    warn!(kind = %request.kind, "handler produced no reply");
                    let error = ReplyError::message(
                        NO_REPLY_ERROR,
                        format!("no reply produced for message type: {}", request.kind),
                    );
                    log_send_error(&request, responder.fail(error));
                    return Handled::Failed;
                }
                Handled::Silent
            }
        }
    }

    fn handle_unknown(&self, request: &Envelope, responder: &Responder) -> Handled {
        warn!(kind = %request.kind, "received unknown message type");
        if responder.correlation_id().is_none() || self.policy == UnknownRequestPolicy::Ignore {
            return Handled::Ignored;
        }
        let error = ReplyError::message(
            UNKNOWN_MESSAGE_ERROR,
            format!("Unknown message type received by extension: {}", request.kind),
        );
        log_send_error(request, responder.fail(error));
        Handled::Rejected
    }

    /// Routes every inbound message on its own task until the channel closes,
    /// then waits for in-flight handlers. Slow handlers never block later
    /// messages.
    pub async fn serve(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<Envelope>) {
        let mut in_flight = JoinSet::new();
        while let Some(request) = inbound.recv().await {
            let router = Arc::clone(&self);
            in_flight.spawn(async move { router.handle(request).await });
            while in_flight.try_join_next().is_some() {}
        }
        while in_flight.join_next().await.is_some() {}
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("RequestRouter")
            .field("handlers", &kinds)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn log_send_error(request: &Envelope, result: BridgeResult<()>) {
    if let Err(err) = result {
        warn!(kind = %request.kind, "failed to send reply: {err}");
    }
}
