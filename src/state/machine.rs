//! Countdown state machine
//!
//! Pure transitions over [`TimerState`]. Every operation receives the current
//! wall-clock time from the caller and performs no I/O; arming wake sources,
//! persisting and alerting are the service's job.
//!
//! ```text
//! Idle --start--> Running --expire/stop--> Finished --reset/start--> ...
//!                   |  ^
//!             pause |  | resume
//!                   v  |
//!              Idle (paused)
//! ```

use super::drift::{self, Correction};
use super::timer_state::{Completion, Phase, TimerState};
use crate::error::TimerError;

/// What a command did to the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started { generation: u64, replaced: Option<u64> },
    Paused { generation: u64 },
    Resumed { generation: u64 },
    Stopped { generation: u64 },
    /// The run reached zero while the command was being applied
    Expired { generation: u64 },
    Reset,
    Unchanged,
}

/// What a wake did to the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The wake belonged to a run that is no longer live
    Stale,
    Debounced,
    Advanced { elapsed_secs: u64, remaining: u64 },
    Expired { generation: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct TimerMachine {
    state: TimerState,
    /// When the last decrement of the live run was applied
    last_applied_at: Option<u64>,
}

impl TimerMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the machine from a persisted snapshot
    pub fn from_state(state: TimerState) -> Self {
        Self {
            state,
            last_applied_at: None,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn snapshot(&self) -> TimerState {
        self.state.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Begin a new run, replacing whatever was live
    pub fn start(&mut self, duration_secs: i64, now_ms: u64) -> Result<Transition, TimerError> {
        if duration_secs <= 0 {
            return Err(TimerError::InvalidDuration(duration_secs));
        }

        let replaced = self.state.is_live().then_some(self.state.generation);
        let generation = self.state.generation + 1;
        self.state = TimerState {
            remaining_seconds: duration_secs as u64,
            phase: Phase::Running,
            paused: false,
            last_tick_at: now_ms,
            generation,
            completion: None,
        };
        self.last_applied_at = None;

        Ok(Transition::Started { generation, replaced })
    }

    /// Cancel the live run. Calling this on anything else does nothing.
    pub fn stop(&mut self) -> Transition {
        if !self.state.is_live() {
            return Transition::Unchanged;
        }

        self.state.phase = Phase::Finished;
        self.state.remaining_seconds = 0;
        self.state.paused = false;
        self.state.completion = Some(Completion::Cancelled);
        Transition::Stopped {
            generation: self.state.generation,
        }
    }

    /// Suspend the countdown, keeping the time left and the generation
    pub fn pause(&mut self, now_ms: u64) -> Result<Transition, TimerError> {
        if !self.state.is_running() {
            return Err(TimerError::NotRunning);
        }

        // Time elapsed up to the pause still counts.
        if let Correction::Expired { .. } = drift::correct(&mut self.state, now_ms) {
            return Ok(Transition::Expired {
                generation: self.state.generation,
            });
        }

        self.state.phase = Phase::Idle;
        self.state.paused = true;
        Ok(Transition::Paused {
            generation: self.state.generation,
        })
    }

    pub fn resume(&mut self, now_ms: u64) -> Result<Transition, TimerError> {
        if !self.state.paused {
            return Err(TimerError::NotPaused);
        }

        self.state.phase = Phase::Running;
        self.state.paused = false;
        self.state.last_tick_at = self.state.last_tick_at.max(now_ms);
        self.last_applied_at = None;
        Ok(Transition::Resumed {
            generation: self.state.generation,
        })
    }

    /// Return a finished or paused timer to a clean idle state
    pub fn reset(&mut self) -> Result<Transition, TimerError> {
        if self.state.is_running() {
            return Err(TimerError::StillRunning);
        }
        if self.state.phase == Phase::Idle && !self.state.paused && self.state.completion.is_none() {
            return Ok(Transition::Unchanged);
        }

        self.state.phase = Phase::Idle;
        self.state.remaining_seconds = 0;
        self.state.paused = false;
        self.state.completion = None;
        Ok(Transition::Reset)
    }

    /// Handle a wake tagged with `generation`
    pub fn tick(&mut self, generation: u64, now_ms: u64) -> Result<WakeOutcome, TimerError> {
        if generation != self.state.generation || !self.state.is_running() {
            return Err(TimerError::StaleCallback {
                live: self.state.generation,
                received: generation,
            });
        }

        if !drift::admits_wake(self.last_applied_at, now_ms) {
            return Ok(WakeOutcome::Debounced);
        }
        Ok(self.correct(now_ms))
    }

    /// Reconcile the live run with the wall clock
    pub fn correct(&mut self, now_ms: u64) -> WakeOutcome {
        match drift::correct(&mut self.state, now_ms) {
            Correction::Inactive => WakeOutcome::Stale,
            Correction::Debounced => WakeOutcome::Debounced,
            Correction::Advanced { elapsed_secs, remaining } => {
                self.last_applied_at = Some(now_ms);
                WakeOutcome::Advanced { elapsed_secs, remaining }
            }
            Correction::Expired { .. } => WakeOutcome::Expired {
                generation: self.state.generation,
            },
        }
    }
}
