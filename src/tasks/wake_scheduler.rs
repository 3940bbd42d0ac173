//! Dual-source wake scheduler
//!
//! Every running generation gets two independent periodic wake sources: a
//! fine primary and a coarse backup. Either one alone is enough to keep the
//! countdown correct, since the drift corrector works from elapsed wall-clock
//! time rather than from the number of wakes delivered.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSource {
    /// Fine-grained source, nominally once per second
    Primary,
    /// Coarse safety net, nominally once per minute
    Backup,
    /// Raised by the suspension watchdog after a detected host suspend
    Resume,
}

/// A wake delivered to the service, tagged with the generation it was armed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    pub source: WakeSource,
    pub generation: u64,
}

pub type WakeSender = mpsc::UnboundedSender<Wake>;
pub type WakeReceiver = mpsc::UnboundedReceiver<Wake>;

#[derive(Debug)]
struct Armed {
    generation: u64,
    primary: JoinHandle<()>,
    backup: JoinHandle<()>,
}

/// Owner of the wake sources for the live generation.
///
/// At most one pair of sources exists at a time. Arming replaces the previous
/// pair and dropping the scheduler tears the sources down.
#[derive(Debug)]
pub struct WakeScheduler {
    wake_tx: WakeSender,
    primary_interval: Duration,
    backup_interval: Duration,
    armed: Option<Armed>,
}

impl WakeScheduler {
    pub fn new(wake_tx: WakeSender, primary_interval: Duration, backup_interval: Duration) -> Self {
        Self {
            wake_tx,
            primary_interval,
            backup_interval,
            armed: None,
        }
    }

    /// Register both wake sources for `generation`. Must run inside a tokio runtime.
    pub fn arm(&mut self, generation: u64) {
        self.disarm();

        let primary = spawn_source(
            self.wake_tx.clone(),
            WakeSource::Primary,
            generation,
            self.primary_interval,
        );
        let backup = spawn_source(
            self.wake_tx.clone(),
            WakeSource::Backup,
            generation,
            self.backup_interval,
        );

        info!(
            "Armed wake sources for generation {} (primary {:?}, backup {:?})",
            generation, self.primary_interval, self.backup_interval
        );
        self.armed = Some(Armed {
            generation,
            primary,
            backup,
        });
    }

    /// Tear down both wake sources. Returns the generation they were armed for.
    pub fn disarm(&mut self) -> Option<u64> {
        let armed = self.armed.take()?;
        armed.primary.abort();
        armed.backup.abort();
        debug!("Disarmed wake sources for generation {}", armed.generation);
        Some(armed.generation)
    }

    pub fn armed_generation(&self) -> Option<u64> {
        self.armed.as_ref().map(|armed| armed.generation)
    }

    /// Sender used by other wake producers such as the suspension watchdog
    pub fn sender(&self) -> WakeSender {
        self.wake_tx.clone()
    }
}

impl Drop for WakeScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn spawn_source(
    wake_tx: WakeSender,
    source: WakeSource,
    generation: u64,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        // A host that stalls us gets one late wake, not a burst of catch-up wakes.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if wake_tx.send(Wake { source, generation }).is_err() {
                debug!("Wake channel closed, {:?} source exiting", source);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn scheduler() -> (WakeScheduler, WakeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            WakeScheduler::new(tx, Duration::from_secs(1), Duration::from_secs(60)),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn both_sources_fire_tagged_with_generation() {
        let (mut scheduler, mut rx) = scheduler();
        scheduler.arm(7);

        let first = rx.recv().await.expect("primary wake");
        assert_eq!(first, Wake { source: WakeSource::Primary, generation: 7 });

        let mut primaries = 1;
        loop {
            let wake = rx.recv().await.expect("wake");
            assert_eq!(wake.generation, 7);
            match wake.source {
                WakeSource::Primary => primaries += 1,
                WakeSource::Backup => break,
                WakeSource::Resume => panic!("scheduler never raises resume wakes"),
            }
        }
        assert!(primaries >= 59);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_silences_both_sources() {
        let (mut scheduler, mut rx) = scheduler();
        scheduler.arm(1);
        rx.recv().await.expect("primary wake");

        assert_eq!(scheduler.disarm(), Some(1));
        assert_eq!(scheduler.armed_generation(), None);
        tokio::task::yield_now().await;
        while rx.try_recv().is_ok() {}

        assert!(timeout(Duration::from_secs(180), rx.recv()).await.is_err());
        assert_eq!(scheduler.disarm(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_generation() {
        let (mut scheduler, mut rx) = scheduler();
        scheduler.arm(1);
        scheduler.arm(2);
        assert_eq!(scheduler.armed_generation(), Some(2));

        for _ in 0..5 {
            let wake = rx.recv().await.expect("wake");
            assert_eq!(wake.generation, 2);
        }
    }
}
