use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use panel_bridge::{Envelope, HandlerResult, RequestHandler, Responder};
use tracing::info;

/// Records that the panel UI has mounted. Never replies.
#[derive(Debug, Default)]
pub struct UiReady {
    seen: AtomicBool,
}

impl UiReady {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestHandler for UiReady {
    async fn handle(&self, _request: &Envelope, _responder: &Responder) -> HandlerResult {
        if self.seen.swap(true, Ordering::SeqCst) {
            info!("panel UI reported ready again");
        } else {
            info!("panel UI reported ready");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_bridge::transport::pair;
    use std::sync::Arc;

    #[tokio::test]
    async fn marks_ready_without_replying() {
        let (host, mut panel) = pair();
        let responder = Responder::new(Arc::new(host.transport), None);
        let handler = UiReady::default();
        assert!(!handler.is_ready());

        let result = handler
            .handle(&Envelope::notification("webviewUiReady", None), &responder)
            .await;
        assert_eq!(result, Ok(None));
        assert!(handler.is_ready());
        assert!(panel.inbound.try_recv().is_err());
    }
}
