use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior, sleep};

/// Timer for reconnection delays.
///
/// Walks through `intervals` on each attempt and sticks to the last one.
/// A single interval gives a fixed delay with no backoff.
pub struct Timer {
    attempts: u32,
    intervals: Vec<u64>,
}

impl Timer {
    pub fn new(intervals: Vec<u64>) -> Self {
        Self {
            attempts: 0,
            intervals,
        }
    }

    /// Same delay on every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self::new(vec![delay.as_millis() as u64])
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        let delay = if (self.attempts as usize) < self.intervals.len() {
            self.intervals[self.attempts as usize]
        } else {
            *self.intervals.last().unwrap_or(&10000)
        };

        self.attempts = self.attempts.saturating_add(1);
        Duration::from_millis(delay)
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Handle to a spawned timer task.
///
/// Cancelling is idempotent, and dropping the handle cancels the task, so a
/// timer never outlives its owner.
#[derive(Debug, Default)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Tracks an arbitrary timer loop
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }

    /// Runs `future` once after `delay`
    pub fn after<F>(delay: Duration, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(async move {
                sleep(delay).await;
                future.await;
            })),
        }
    }

    /// Runs `tick` every `period`, first run one period from now
    pub fn every<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(async move {
                let mut interval = time::interval_at(time::Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    tick().await;
                }
            })),
        }
    }

    /// Whether the task is still scheduled or running
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort the task; safe to call any number of times
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Forget the task without aborting it (used when a task tears down its own owner)
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
