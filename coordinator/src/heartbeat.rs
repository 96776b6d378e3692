//! Heartbeat Driver (§4.6). Issues a `poll` every `polling_interval`
//! unconditionally, on its own ticker, regardless of other command traffic.

use std::sync::Arc;
use std::time::Duration;

use helmet_protocol::CommandKind;
use tokio::sync::watch;

use crate::issuer::Issuer;

pub async fn run_heartbeat(
    issuer: Arc<Issuer>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break; }
            }
        }
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = issuer.issue(CommandKind::Poll, "heartbeat_poll", None).await {
            tracing::warn!("heartbeat poll failed: {e}");
        }
    }
}
