//! Correlated request/response messaging between an editor host and its embedded panel.

mod client;
mod config;
mod correlation;
mod dispatcher;
mod envelope;
mod error;
pub mod framing;
mod peer;
mod router;
pub mod transport;

pub use client::{RequestClient, DEFAULT_REQUEST_TIMEOUT};
pub use config::{find_config_file, BridgeConfig, BridgeSection, CONFIG_FILES};
pub use correlation::{CorrelationTable, PendingInfo, ReplyOutcome};
pub use dispatcher::{Dispatcher, Routed, Subscription};
pub use envelope::{CorrelationId, Envelope};
pub use error::{BridgeError, BridgeResult};
pub use peer::PanelPeer;
pub use router::{
    FnHandler, Handled, HandlerResult, Reply, ReplyError, RequestHandler, RequestRouter,
    Responder, UnknownRequestPolicy, NO_REPLY_ERROR, UNKNOWN_MESSAGE_ERROR,
};
pub use transport::{ChannelEnd, ChannelTransport, Transport};
