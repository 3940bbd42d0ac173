//! Wake dispatch background task

use std::sync::Arc;

use tracing::{debug, error, info};

use super::wake_scheduler::WakeReceiver;
use crate::state::{AppState, WakeOutcome};

/// Background task that feeds every wake into the timer service, one at a time
pub async fn wake_dispatch_task(state: Arc<AppState>, mut wake_rx: WakeReceiver) {
    info!("Starting wake dispatch task");

    while let Some(wake) = wake_rx.recv().await {
        match state.handle_wake(wake) {
            Ok(WakeOutcome::Expired { generation }) => {
                debug!("{:?} wake completed generation {}", wake.source, generation);
            }
            Ok(WakeOutcome::Advanced { remaining, .. }) => {
                debug!("{:?} wake: {}s left", wake.source, remaining);
            }
            Ok(WakeOutcome::Debounced | WakeOutcome::Stale) => {}
            Err(e) => {
                error!("Failed to handle {:?} wake: {}", wake.source, e);
            }
        }
    }

    info!("Wake channel closed, dispatch task exiting");
}
