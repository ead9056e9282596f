//! Requesting peer: a request client and an inbound dispatcher sharing one table.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::RequestClient;
use crate::config::BridgeConfig;
use crate::correlation::CorrelationTable;
use crate::dispatcher::Dispatcher;
use crate::envelope::Envelope;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct PanelPeer {
    client: RequestClient,
    dispatcher: Dispatcher,
}

impl PanelPeer {
    pub fn new(transport: Arc<dyn Transport>, config: &BridgeConfig) -> Self {
        let table = Arc::new(CorrelationTable::new());
        let client =
            RequestClient::new(Arc::clone(&table), transport).with_timeout(config.request_timeout);
        let dispatcher = Dispatcher::new(table);
        Self { client, dispatcher }
    }

    #[must_use]
    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Pumps `inbound` through the dispatcher on a background task.
    pub fn spawn(&self, inbound: mpsc::UnboundedReceiver<Envelope>) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move { dispatcher.run(inbound).await })
    }
}
