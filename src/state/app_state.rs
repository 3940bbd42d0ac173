//! Main application state management
//!
//! `AppState` is the single owner of the timer. Commands from the API and
//! wakes from the scheduler both take the same lock before touching the
//! countdown, so no read-modify-write ever interleaves with another.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::{TimerMachine, TimerState, TimerUpdate, Transition, WakeOutcome};
use crate::{
    clock::Clock,
    config::TimerSettings,
    error::TimerError,
    services::{Broadcaster, PlaybackDelegate},
    store::{StateStore, StoreChange},
    tasks::wake_scheduler::{Wake, WakeReceiver, WakeScheduler, WakeSource},
};

/// Everything that must change together under one lock
#[derive(Debug)]
struct TimerCore {
    machine: TimerMachine,
    scheduler: WakeScheduler,
    /// Last publish failed; the next wake or watchdog pass retries it
    publish_pending: bool,
    /// Generation whose completion sound was already requested
    alerted_generation: Option<u64>,
}

/// Main application state that owns the timer and its collaborators
pub struct AppState {
    core: Mutex<TimerCore>,
    broadcaster: Broadcaster,
    playback: Arc<dyn PlaybackDelegate>,
    clock: Arc<dyn Clock>,
    settings: TimerSettings,
    /// Server metadata
    pub start_time: Instant,
}

impl AppState {
    /// Create the service. The returned receiver must be drained by
    /// [`crate::tasks::wake_dispatch_task`] for wakes to have any effect.
    pub fn new(
        store: Arc<dyn StateStore>,
        playback: Arc<dyn PlaybackDelegate>,
        clock: Arc<dyn Clock>,
        settings: TimerSettings,
    ) -> (Self, WakeReceiver) {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let scheduler = WakeScheduler::new(
            wake_tx,
            settings.primary_interval,
            settings.backup_interval,
        );

        let state = Self {
            core: Mutex::new(TimerCore {
                machine: TimerMachine::new(),
                scheduler,
                publish_pending: false,
                alerted_generation: None,
            }),
            broadcaster: Broadcaster::new(store),
            playback,
            clock,
            settings,
            start_time: Instant::now(),
        };
        (state, wake_rx)
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn lock_core(&self) -> Result<MutexGuard<'_, TimerCore>, TimerError> {
        self.core.lock().map_err(|e| {
            warn!("Failed to lock timer state: {}", e);
            TimerError::Poisoned
        })
    }

    /// Run `f` under the serialization lock, then fire the completion sound
    /// if `f` reported a generation that expired.
    fn with_core<T, F>(&self, f: F) -> Result<T, TimerError>
    where
        F: FnOnce(&Self, &mut TimerCore) -> Result<(T, Option<u64>), TimerError>,
    {
        let mut core = self.lock_core()?;
        let (value, expired) = f(self, &mut *core)?;
        let alert = expired.filter(|generation| claim_alert(&mut *core, *generation));
        drop(core);

        if let Some(generation) = alert {
            self.sound_alert(generation);
        }
        Ok(value)
    }

    /// Persist the current snapshot; on failure keep it pending for a retry
    fn publish(&self, core: &mut TimerCore) {
        match self.broadcaster.publish(core.machine.state()) {
            Ok(()) => {
                if core.publish_pending {
                    info!("State store reachable again, snapshot published");
                }
                core.publish_pending = false;
            }
            Err(e) => {
                warn!("Failed to publish timer state, will retry on next wake: {}", e);
                core.publish_pending = true;
            }
        }
    }

    /// Start a new countdown, cancelling any live one
    pub fn start_timer(&self, duration_secs: i64) -> Result<TimerState, TimerError> {
        let now = self.now_ms();
        self.with_core(|this, core| {
            let transition = core.machine.start(duration_secs, now)?;
            if let Transition::Started { generation, replaced } = transition {
                if let Some(old) = replaced {
                    info!("Generation {} replaced by generation {}", old, generation);
                }
                core.scheduler.arm(generation);
                info!("Timer started: {}s, generation {}", duration_secs, generation);
            }
            this.publish(core);
            Ok((core.machine.snapshot(), None))
        })
    }

    /// Cancel the live countdown. Safe to call in any state.
    pub fn stop_timer(&self) -> Result<TimerState, TimerError> {
        self.with_core(|this, core| {
            core.scheduler.disarm();
            match core.machine.stop() {
                Transition::Stopped { generation } => {
                    info!("Timer generation {} cancelled", generation);
                    this.publish(core);
                }
                _ => debug!("Stop requested with no live timer"),
            }
            Ok((core.machine.snapshot(), None))
        })
    }

    pub fn pause_timer(&self) -> Result<TimerState, TimerError> {
        let now = self.now_ms();
        self.with_core(|this, core| {
            let transition = core.machine.pause(now)?;
            core.scheduler.disarm();
            this.publish(core);

            let expired = match transition {
                Transition::Expired { generation } => {
                    info!("Timer generation {} expired while pausing", generation);
                    Some(generation)
                }
                _ => {
                    info!(
                        "Timer paused with {}s left",
                        core.machine.state().remaining_seconds
                    );
                    None
                }
            };
            Ok((core.machine.snapshot(), expired))
        })
    }

    pub fn resume_timer(&self) -> Result<TimerState, TimerError> {
        let now = self.now_ms();
        self.with_core(|this, core| {
            if let Transition::Resumed { generation } = core.machine.resume(now)? {
                core.scheduler.arm(generation);
                info!("Timer generation {} resumed", generation);
            }
            this.publish(core);
            Ok((core.machine.snapshot(), None))
        })
    }

    pub fn reset_timer(&self) -> Result<TimerState, TimerError> {
        self.with_core(|this, core| {
            if core.machine.reset()? == Transition::Reset {
                info!("Timer reset to idle");
                this.publish(core);
            }
            Ok((core.machine.snapshot(), None))
        })
    }

    /// Read-only snapshot of the timer
    pub fn query(&self) -> Result<TimerState, TimerError> {
        Ok(self.lock_core()?.machine.snapshot())
    }

    /// Handle one wake from any source. Stale wakes are discarded silently.
    pub fn handle_wake(&self, wake: Wake) -> Result<WakeOutcome, TimerError> {
        let now = self.now_ms();
        self.with_core(|this, core| {
            let outcome = match core.machine.tick(wake.generation, now) {
                Ok(outcome) => outcome,
                Err(TimerError::StaleCallback { live, received }) => {
                    debug!(
                        "Discarding {:?} wake for generation {} (live {})",
                        wake.source, received, live
                    );
                    WakeOutcome::Stale
                }
                Err(e) => return Err(e),
            };

            let expired = match outcome {
                WakeOutcome::Expired { generation } => {
                    core.scheduler.disarm();
                    info!("Timer generation {} finished", generation);
                    Some(generation)
                }
                WakeOutcome::Advanced { elapsed_secs, remaining } if elapsed_secs > 1 => {
                    info!(
                        "{:?} wake corrected a {}s gap, {}s left",
                        wake.source, elapsed_secs, remaining
                    );
                    None
                }
                _ => None,
            };

            let changed = matches!(
                outcome,
                WakeOutcome::Advanced { .. } | WakeOutcome::Expired { .. }
            );
            if changed || core.publish_pending {
                this.publish(core);
            }
            Ok((outcome, expired))
        })
    }

    /// Queue a correction of the live generation, e.g. after a detected suspend
    pub fn request_correction(&self, source: WakeSource) -> Result<(), TimerError> {
        let core = self.lock_core()?;
        if !core.machine.state().is_running() {
            return Ok(());
        }
        let wake = Wake {
            source,
            generation: core.machine.generation(),
        };
        let wake_tx = core.scheduler.sender();
        drop(core);

        if wake_tx.send(wake).is_err() {
            warn!("Wake channel closed, correction dropped");
        }
        Ok(())
    }

    /// Retry a snapshot write that failed earlier
    pub fn retry_pending_publish(&self) -> Result<bool, TimerError> {
        let mut core = self.lock_core()?;
        if !core.publish_pending {
            return Ok(false);
        }
        self.publish(&mut core);
        Ok(!core.publish_pending)
    }

    /// Rebuild the timer from the store after a process restart.
    ///
    /// A running snapshot is corrected once for the time the process was gone
    /// before any wake source is armed again.
    pub fn restore(&self) -> Result<TimerState, TimerError> {
        let persisted = match self.broadcaster.load() {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Failed to read persisted timer state, starting idle: {}", e);
                None
            }
        };
        let now = self.now_ms();

        self.with_core(|this, core| {
            let Some(persisted) = persisted else {
                debug!("No persisted timer state");
                return Ok((core.machine.snapshot(), None));
            };

            info!(
                "Restoring generation {} ({:?}, {}s left)",
                persisted.generation, persisted.phase, persisted.remaining_seconds
            );
            if persisted.is_finished() {
                // Its completion already happened in a previous life.
                core.alerted_generation = Some(persisted.generation);
            }
            core.scheduler.disarm();
            core.machine = TimerMachine::from_state(persisted);

            let mut expired = None;
            if core.machine.state().is_running() {
                match core.machine.correct(now) {
                    WakeOutcome::Expired { generation } => {
                        info!("Generation {} expired while the process was down", generation);
                        expired = Some(generation);
                    }
                    _ => {
                        let generation = core.machine.generation();
                        core.scheduler.arm(generation);
                        info!(
                            "Generation {} resumed with {}s left",
                            generation,
                            core.machine.state().remaining_seconds
                        );
                    }
                }
            }

            this.publish(core);
            Ok((core.machine.snapshot(), expired))
        })
    }

    /// Disarm wake sources and write a final snapshot before exiting
    pub fn shutdown(&self) -> Result<(), TimerError> {
        let mut core = self.lock_core()?;
        core.scheduler.disarm();
        self.publish(&mut core);
        info!("Timer service shut down");
        Ok(())
    }

    /// Generation the wake sources are currently armed for
    pub fn armed_generation(&self) -> Result<Option<u64>, TimerError> {
        Ok(self.lock_core()?.scheduler.armed_generation())
    }

    /// Observer record as last written to the store
    pub fn latest_update(&self) -> Result<Option<TimerUpdate>, TimerError> {
        Ok(self.broadcaster.latest_update()?)
    }

    /// Subscribe to store changes, the same feed every observer uses
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.broadcaster.subscribe()
    }

    /// Play the completion sound without holding up the timer
    fn sound_alert(&self, generation: u64) {
        let playback = Arc::clone(&self.playback);
        let timeout = self.settings.playback_timeout;

        tokio::spawn(async move {
            let attempt = async {
                playback.ensure_provisioned().await?;
                playback.play().await
            };
            match tokio::time::timeout(timeout, attempt).await {
                Ok(Ok(reply)) if reply.success => {
                    info!("Completion sound played for generation {}", generation)
                }
                Ok(Ok(_)) => warn!("Playback context reported failure for generation {}", generation),
                Ok(Err(e)) => warn!("Completion sound unavailable for generation {}: {}", generation, e),
                Err(_) => warn!("Completion sound timed out after {:?}", timeout),
            }
        });
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Record that `generation` gets its completion sound; false if it already did
fn claim_alert(core: &mut TimerCore, generation: u64) -> bool {
    if core.alerted_generation.is_some_and(|alerted| alerted >= generation) {
        return false;
    }
    core.alerted_generation = Some(generation);
    true
}
