//! Wall-clock source used by the drift corrector

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Source of wall-clock time in milliseconds since the Unix epoch.
///
/// The service never counts callbacks; every correction is computed from
/// two readings of this clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Clock backed by the system wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Pre-epoch clocks read as zero.
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now_ms.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
