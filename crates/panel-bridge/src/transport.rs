//! Outgoing side of the message channel.
//! - Transport: enqueue one envelope, no acknowledgement
//! - ChannelTransport/pair: in-process channel ends

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::{BridgeError, BridgeResult};

/// The host-supplied "send message" primitive.
pub trait Transport: Send + Sync {
    fn post(&self, envelope: &Envelope) -> BridgeResult<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn post(&self, envelope: &Envelope) -> BridgeResult<()> {
        (**self).post(envelope)
    }
}

/// Transport backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn post(&self, envelope: &Envelope) -> BridgeResult<()> {
        self.tx
            .send(envelope.clone())
            .map_err(|_| BridgeError::Transport("channel closed".into()))
    }
}

/// One end of an in-process channel: post to the peer, receive from the peer.
#[derive(Debug)]
pub struct ChannelEnd {
    pub transport: ChannelTransport,
    pub inbound: mpsc::UnboundedReceiver<Envelope>,
}

/// Two connected channel ends; FIFO in each direction.
#[must_use]
pub fn pair() -> (ChannelEnd, ChannelEnd) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    (
        ChannelEnd {
            transport: ChannelTransport::new(left_tx),
            inbound: left_rx,
        },
        ChannelEnd {
            transport: ChannelTransport::new(right_tx),
            inbound: right_rx,
        },
    )
}
