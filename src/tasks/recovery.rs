//! Restart recovery and suspension detection

use std::{sync::Arc, time::Duration};

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::wake_scheduler::WakeSource;
use crate::state::{AppState, TimerState};

/// Wall-clock progress beyond monotonic progress that counts as a host suspend
const SUSPEND_GAP: Duration = Duration::from_secs(2);

/// Rebuild the timer from the store when the process starts.
///
/// Falls back to a fresh idle timer if the persisted state cannot be used.
pub fn restore_timer(state: &AppState) -> TimerState {
    match state.restore() {
        Ok(restored) => {
            info!(
                "Timer restored: {:?}, {}s left, generation {}",
                restored.phase, restored.remaining_seconds, restored.generation
            );
            restored
        }
        Err(e) => {
            warn!("Failed to restore timer state: {}", e);
            TimerState::new()
        }
    }
}

/// Background task that notices host suspension and corrects immediately.
///
/// The monotonic clock stops while the host is suspended, the wall clock does
/// not. When the wall clock has run ahead, the countdown is corrected right
/// away instead of waiting for the next scheduled wake. Each pass also retries
/// a snapshot write the store refused earlier.
pub async fn suspension_watch_task(state: Arc<AppState>, period: Duration) {
    info!("Starting suspension watch task");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut last_instant = Instant::now();
    let mut last_wall_ms = state.now_ms();

    loop {
        ticker.tick().await;

        let now_instant = Instant::now();
        let now_wall_ms = state.now_ms();
        let monotonic = now_instant.duration_since(last_instant);
        let wall = Duration::from_millis(now_wall_ms.saturating_sub(last_wall_ms));
        last_instant = now_instant;
        last_wall_ms = now_wall_ms;

        if let Some(gap) = suspend_gap(wall, monotonic) {
            info!("Host suspension of about {}s detected, correcting timer", gap.as_secs());
            if let Err(e) = state.request_correction(WakeSource::Resume) {
                warn!("Failed to request correction after suspension: {}", e);
            }
        }

        match state.retry_pending_publish() {
            Ok(true) => debug!("Pending snapshot written"),
            Ok(false) => {}
            Err(e) => warn!("Failed to retry pending snapshot: {}", e),
        }
    }
}

fn suspend_gap(wall: Duration, monotonic: Duration) -> Option<Duration> {
    let gap = wall.saturating_sub(monotonic);
    (gap >= SUSPEND_GAP).then_some(gap)
}
