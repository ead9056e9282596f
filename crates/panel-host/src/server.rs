//! Framed stdio loop: read envelopes, route them, write replies.

use std::sync::Arc;

use anyhow::Context;
use panel_bridge::framing::{read_frame, FramedTransport, ProtocolLog};
use panel_bridge::{Envelope, RequestRouter, Transport};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::handlers;

/// Notification announcing that the host is ready for requests.
pub const WEBVIEW_READY: &str = "webviewReady";

/// Serves one panel connection until `reader` reaches EOF.
///
/// Announces readiness first, then handles each inbound message on its own
/// task. In-flight handlers are awaited and every queued frame is flushed
/// before returning.
pub async fn run<R, W>(reader: R, writer: W, config: &HostConfig) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let log = match &config.bridge.protocol_log {
        Some(path) => Some(Arc::new(ProtocolLog::open(path).with_context(|| {
            format!("failed to open protocol log {}", path.display())
        })?)),
        None => None,
    };

    let (framed, writer_task) = FramedTransport::spawn(writer, log.clone());
    let transport: Arc<dyn Transport> = Arc::new(framed);
    let mut router =
        RequestRouter::new(Arc::clone(&transport)).with_policy(config.bridge.unknown_requests);
    handlers::register_defaults(&mut router, &config.simulation);
    let router = Arc::new(router);
    debug!(?router, "handlers registered");

    transport.post(&Envelope::notification(WEBVIEW_READY, Some(json!(true))))?;
    info!("panel host ready");

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let serving = tokio::spawn(Arc::clone(&router).serve(inbound_rx));
    drop(router);

    let mut reader = BufReader::new(reader);
    let read_result = pump(&mut reader, &inbound_tx, log.as_deref()).await;
    drop(inbound_tx);
    info!("input closed; waiting for in-flight handlers");
    serving.await.context("request router task failed")?;
    read_result?;

    drop(transport);
    writer_task.await.context("frame writer task failed")??;
    Ok(())
}

/// Forwards every well-formed inbound envelope until EOF.
async fn pump<R>(
    reader: &mut BufReader<R>,
    inbound: &mpsc::UnboundedSender<Envelope>,
    log: Option<&ProtocolLog>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(payload) = read_frame(reader).await? {
        if let Some(log) = log {
            let _ = log.record("<-", &payload);
        }
        match Envelope::from_json(&payload) {
            Ok(envelope) => {
                if inbound.send(envelope).is_err() {
                    warn!("request router stopped; dropping input");
                    break;
                }
            }
            Err(err) => warn!("dropping inbound message: {err}"),
        }
    }
    Ok(())
}
