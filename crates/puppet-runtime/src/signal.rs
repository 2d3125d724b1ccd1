//! Interrupt handling.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `shutdown` on the first Ctrl-C.
///
/// Later interrupts are swallowed so a second Ctrl-C during teardown cannot
/// kill the orchestrator halfway. The listener runs until its handle is
/// aborted.
pub fn spawn_interrupt_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match tokio::signal::ctrl_c().await {
                Ok(()) if shutdown.is_cancelled() => {
                    info!("interrupt ignored, shutdown already in progress");
                }
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    shutdown.cancel();
                }
                Err(error) => {
                    warn!(%error, "cannot listen for interrupts");
                    return;
                }
            }
        }
    })
}
