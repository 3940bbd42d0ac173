//! Drift correction
//!
//! Wakes are not counted. Each wake compares the wall clock with the instant
//! the last decrement accounts for and applies the whole elapsed seconds in
//! one step, so a primary wake, a backup wake, or a wake after hours of
//! suspension all converge on the same remaining time.

use super::timer_state::{Completion, Phase, TimerState};

const MILLIS_PER_SECOND: u64 = 1_000;

/// Minimum spacing between two wakes that may both take time off
pub const MIN_WAKE_GAP_MS: u64 = 900;

/// Result of reconciling a timer against the wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// The timer is not running
    Inactive,
    /// Less than a whole second has passed since the last decrement
    Debounced,
    /// Time was taken off and the countdown continues
    Advanced { elapsed_secs: u64, remaining: u64 },
    /// The countdown reached zero on this correction
    Expired { elapsed_secs: u64 },
}

/// Apply the wall-clock time elapsed since `last_tick_at` to a running timer.
///
/// `last_tick_at` moves forward by the whole seconds applied, keeping the
/// sub-second remainder for the next correction. A clock that steps
/// backwards reads as no time elapsed.
pub fn correct(state: &mut TimerState, now_ms: u64) -> Correction {
    if state.phase != Phase::Running {
        return Correction::Inactive;
    }

    let elapsed_ms = now_ms.saturating_sub(state.last_tick_at);
    let elapsed_secs = elapsed_ms / MILLIS_PER_SECOND;

    if state.remaining_seconds == 0 {
        expire(state, elapsed_secs);
        return Correction::Expired { elapsed_secs };
    }

    if elapsed_secs == 0 {
        return Correction::Debounced;
    }

    state.remaining_seconds -= state.remaining_seconds.min(elapsed_secs);
    state.last_tick_at += elapsed_secs * MILLIS_PER_SECOND;

    if state.remaining_seconds == 0 {
        expire(state, elapsed_secs);
        Correction::Expired { elapsed_secs }
    } else {
        Correction::Advanced {
            elapsed_secs,
            remaining: state.remaining_seconds,
        }
    }
}

/// Whether a wake at `now_ms` may apply time, given when the last decrement
/// was applied. Wakes bunched closer than [`MIN_WAKE_GAP_MS`] are dropped;
/// the carried `last_tick_at` makes up for them on the next admitted wake.
pub fn admits_wake(last_applied_at: Option<u64>, now_ms: u64) -> bool {
    match last_applied_at {
        Some(applied) => now_ms >= applied && now_ms - applied >= MIN_WAKE_GAP_MS,
        None => true,
    }
}

fn expire(state: &mut TimerState, elapsed_secs: u64) {
    state.phase = Phase::Finished;
    state.remaining_seconds = 0;
    state.paused = false;
    state.completion = Some(Completion::Expired);
    tracing::debug!(
        "generation {} expired after {}s correction",
        state.generation,
        elapsed_secs
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(remaining_seconds: u64, last_tick_at: u64) -> TimerState {
        TimerState {
            remaining_seconds,
            phase: Phase::Running,
            paused: false,
            last_tick_at,
            generation: 1,
            completion: None,
        }
    }

    #[test]
    fn long_gap_is_corrected_in_one_jump() {
        let t0 = 1_700_000_000_000;
        let mut state = running(200, t0);

        let correction = correct(&mut state, t0 + 125_000);

        assert_eq!(
            correction,
            Correction::Advanced { elapsed_secs: 125, remaining: 75 }
        );
        assert_eq!(state.remaining_seconds, 75);
        assert_eq!(state.last_tick_at, t0 + 125_000);
    }

    #[test]
    fn sub_second_wakes_are_debounced() {
        let t0 = 10_000;
        let mut state = running(30, t0);

        assert!(matches!(correct(&mut state, t0 + 1_000), Correction::Advanced { .. }));
        assert_eq!(correct(&mut state, t0 + 1_200), Correction::Debounced);
        assert_eq!(state.remaining_seconds, 29);
        assert_eq!(state.last_tick_at, t0 + 1_000);
    }

    #[test]
    fn wake_gate_holds_back_bunched_wakes() {
        let mut state = running(30, 0);

        assert!(admits_wake(None, 1_900));
        assert!(matches!(correct(&mut state, 1_900), Correction::Advanced { remaining: 29, .. }));

        // 200ms later the anchor alone would allow a second decrement.
        assert!(!admits_wake(Some(1_900), 2_100));
        assert_eq!(state.remaining_seconds, 29);

        assert!(admits_wake(Some(1_900), 2_800));
        assert_eq!(
            correct(&mut state, 2_800),
            Correction::Advanced { elapsed_secs: 1, remaining: 28 }
        );
        assert_eq!(state.last_tick_at, 2_000);
    }

    #[test]
    fn wake_gate_rejects_clock_stepping_backwards() {
        assert!(!admits_wake(Some(5_000), 4_000));
        assert!(admits_wake(Some(5_000), 5_900));
    }

    #[test]
    fn remainder_is_carried_between_corrections() {
        let t0 = 0;
        let mut state = running(10, t0);

        correct(&mut state, 1_500);
        assert_eq!(state.remaining_seconds, 9);
        assert_eq!(state.last_tick_at, 1_000);

        correct(&mut state, 3_000);
        assert_eq!(state.remaining_seconds, 7);
        assert_eq!(state.last_tick_at, 3_000);
    }

    #[test]
    fn overshoot_clamps_to_zero_and_expires() {
        let mut state = running(50, 0);

        let correction = correct(&mut state, 70_000);

        assert_eq!(correction, Correction::Expired { elapsed_secs: 70 });
        assert_eq!(state.remaining_seconds, 0);
        assert_eq!(state.phase, Phase::Finished);
        assert_eq!(state.completion, Some(Completion::Expired));
    }

    #[test]
    fn finished_timer_is_not_corrected_again() {
        let mut state = running(1, 0);
        assert!(matches!(correct(&mut state, 5_000), Correction::Expired { .. }));

        let before = state.clone();
        assert_eq!(correct(&mut state, 9_000), Correction::Inactive);
        assert_eq!(state, before);
    }

    #[test]
    fn clock_stepping_backwards_changes_nothing() {
        let mut state = running(20, 50_000);

        assert_eq!(correct(&mut state, 10_000), Correction::Debounced);
        assert_eq!(state.remaining_seconds, 20);
        assert_eq!(state.last_tick_at, 50_000);
    }

    #[test]
    fn running_with_nothing_left_expires_immediately() {
        let mut state = running(0, 0);

        assert_eq!(correct(&mut state, 100), Correction::Expired { elapsed_secs: 0 });
        assert!(state.is_finished());
    }
}
