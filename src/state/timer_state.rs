//! Timer state structure and the records derived from it

use serde::{Deserialize, Serialize};

/// Phase of the countdown state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Finished,
}

/// Why a run reached `Finished`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    /// The countdown reached zero on its own
    Expired,
    /// The countdown was stopped before reaching zero
    Cancelled,
}

/// The single persisted timer entity.
///
/// This is what gets written under the `timer_state` key and what a restarted
/// process reads back to find out whether a countdown was in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub remaining_seconds: u64,
    pub phase: Phase,
    /// Set while a run is suspended by `pause`; the phase is `Idle` meanwhile
    #[serde(default)]
    pub paused: bool,
    /// Wall-clock instant (ms since epoch) the last decrement accounts for
    pub last_tick_at: u64,
    pub generation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
}

impl TimerState {
    /// Create a fresh idle timer state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// A run that can still make progress, either counting or paused
    pub fn is_live(&self) -> bool {
        self.is_running() || self.paused
    }

    /// Record published to observers under the `timer_update` key
    pub fn to_update(&self) -> TimerUpdate {
        TimerUpdate {
            kind: UpdateKind::TimerUpdate,
            time: self.remaining_seconds,
            is_counting_down: self.is_running(),
            is_paused: self.paused,
            is_finished: self.is_finished(),
            generation: self.generation,
            completion: self.completion,
        }
    }

    /// Compact view returned in command acknowledgements
    pub fn summary(&self) -> TimerSummary {
        TimerSummary {
            time_left: self.remaining_seconds,
            is_running: self.is_running(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    #[serde(rename = "TIMER_UPDATE")]
    TimerUpdate,
}

/// State broadcast record read by observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub time: u64,
    pub is_counting_down: bool,
    pub is_paused: bool,
    pub is_finished: bool,
    pub generation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSummary {
    pub time_left: u64,
    pub is_running: bool,
}
