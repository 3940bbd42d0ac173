//! Signal handling for graceful shutdown

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use futures::stream::StreamExt;
use tracing::{info, warn};

/// Wait for SIGTERM or SIGINT.
///
/// A supervisor that wants the process gone sends SIGTERM; the service writes
/// its last snapshot and exits. If the handler cannot be installed, Ctrl-C is
/// the only way out.
pub async fn shutdown_signal() {
    match Signals::new([SIGTERM, SIGINT]) {
        Ok(mut signals) => {
            if let Some(signal) = signals.next().await {
                let name = if signal == SIGTERM { "SIGTERM" } else { "SIGINT" };
                info!("Received {}", name);
            }
        }
        Err(e) => {
            warn!("Failed to install signal handler ({}), waiting for Ctrl-C", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        }
    }
}
