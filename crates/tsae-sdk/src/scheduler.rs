//! Cancellable periodic task runner.

use crate::error::SdkError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs a task after an initial delay and then at a fixed period.
pub struct PeriodicScheduler;

impl PeriodicScheduler {
    /// Spawn `task` on the current tokio runtime.
    ///
    /// A tick that is already running finishes before the stop signal is
    /// observed. Ticks that fall behind are delayed, not bunched. Dropping
    /// the handle stops the loop as well.
    pub fn spawn<F, Fut>(delay: Duration, period: Duration, mut task: F) -> SchedulerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();

        let join = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => return,
            }

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = interval.tick() => {
                        task().await;
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
                if *stop_rx.borrow() {
                    break;
                }
            }
        });

        SchedulerHandle {
            stop_tx,
            join,
            ticks,
        }
    }
}

/// Handle to a running [`PeriodicScheduler`] task.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Ask the loop to exit after the current tick.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop to exit.
    pub async fn join(self) -> Result<(), SdkError> {
        self.join
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))
    }

    /// [`stop`](Self::stop) followed by [`join`](Self::join).
    pub async fn shutdown(self) -> Result<(), SdkError> {
        self.stop();
        self.join().await
    }
}
