//! Command routing
//!
//! Front-ends never touch the timer directly. They send one of the messages
//! below and get an acknowledgement back.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::TimerError,
    state::{AppState, TimerState, TimerSummary},
};

/// Commands accepted from front-end callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    StartTimer { duration: i64 },
    StopTimer,
    GetTimerState,
    PauseTimer,
    ResumeTimer,
    ResetTimer,
}

/// Acknowledgement returned for every command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TimerSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok(state: &TimerState) -> Self {
        Self {
            success: true,
            state: Some(state.summary()),
            error: None,
        }
    }

    pub fn rejected(error: &TimerError, state: Option<&TimerState>) -> Self {
        Self {
            success: false,
            state: state.map(TimerState::summary),
            error: Some(error.to_string()),
        }
    }
}

/// Validate `command` and apply it to the timer
pub fn dispatch(state: &AppState, command: Command) -> Ack {
    debug!("Dispatching {:?}", command);

    let result = match command {
        Command::StartTimer { duration } => state.start_timer(duration),
        Command::StopTimer => state.stop_timer(),
        Command::GetTimerState => state.query(),
        Command::PauseTimer => state.pause_timer(),
        Command::ResumeTimer => state.resume_timer(),
        Command::ResetTimer => state.reset_timer(),
    };

    match result {
        Ok(snapshot) => Ack::ok(&snapshot),
        Err(e) => {
            if e.is_rejection() {
                debug!("{:?} rejected: {}", command, e);
            } else {
                warn!("{:?} failed: {}", command, e);
            }
            Ack::rejected(&e, state.query().ok().as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_parse_from_front_end_messages() {
        let start: Command =
            serde_json::from_value(json!({ "type": "START_TIMER", "duration": 90 }))
                .expect("parse start");
        assert_eq!(start, Command::StartTimer { duration: 90 });

        let stop: Command =
            serde_json::from_value(json!({ "type": "STOP_TIMER" })).expect("parse stop");
        assert_eq!(stop, Command::StopTimer);

        let query: Command =
            serde_json::from_value(json!({ "type": "GET_TIMER_STATE" })).expect("parse query");
        assert_eq!(query, Command::GetTimerState);

        assert!(serde_json::from_value::<Command>(json!({ "type": "START_TIMER" })).is_err());
        assert!(serde_json::from_value::<Command>(json!({ "type": "SNOOZE" })).is_err());
    }

    #[test]
    fn ack_serializes_time_left_and_running_flag() {
        let state = TimerState {
            remaining_seconds: 12,
            phase: crate::state::Phase::Running,
            ..TimerState::default()
        };

        assert_eq!(
            serde_json::to_value(Ack::ok(&state)).expect("serialize ack"),
            json!({ "success": true, "state": { "timeLeft": 12, "isRunning": true } })
        );

        let rejected = Ack::rejected(&TimerError::InvalidDuration(0), None);
        let value = serde_json::to_value(rejected).expect("serialize ack");
        assert_eq!(value["success"], json!(false));
        assert!(value.get("state").is_none());
        assert!(value["error"].as_str().is_some_and(|e| e.contains("invalid duration")));
    }
}
