#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use countdown_keeper::{
    services::{PlaybackDelegate, PlaybackError, PlaybackReply},
    state::AppState,
    store::StateStore,
    tasks::wake_scheduler::WakeReceiver,
    ManualClock, TimerSettings,
};

pub const T0: u64 = 1_700_000_000_000;

/// Playback delegate that counts what the service asked of it
#[derive(Debug, Default)]
pub struct CountingPlayback {
    refuse: bool,
    provisions: AtomicUsize,
    plays: AtomicUsize,
}

impl CountingPlayback {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn provisions(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackDelegate for CountingPlayback {
    async fn ensure_provisioned(&self) -> Result<(), PlaybackError> {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(PlaybackError::Provision("host refused".to_string()));
        }
        Ok(())
    }

    async fn play(&self) -> Result<PlaybackReply, PlaybackError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(PlaybackReply { success: true })
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub wake_rx: WakeReceiver,
    pub clock: Arc<ManualClock>,
    pub playback: Arc<CountingPlayback>,
}

pub fn harness(store: Arc<dyn StateStore>) -> Harness {
    harness_with(store, CountingPlayback::default(), TimerSettings::default())
}

pub fn harness_with(
    store: Arc<dyn StateStore>,
    playback: CountingPlayback,
    settings: TimerSettings,
) -> Harness {
    let clock = Arc::new(ManualClock::new(T0));
    let playback = Arc::new(playback);
    let (state, wake_rx) = AppState::new(store, playback.clone(), clock.clone(), settings);
    Harness {
        state: Arc::new(state),
        wake_rx,
        clock,
        playback,
    }
}

/// Poll until `check` holds or a second has passed
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
