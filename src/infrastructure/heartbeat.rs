use super::ScheduledTask;
use crate::connection::ConnectionManager;
use crate::types::constants::{HEARTBEAT_INTERVAL, TASK_KEEPALIVE};
use std::sync::Weak;
use std::time::Duration;
use tokio::time;

/// Sends a keep-alive payload on a fixed interval while the channel is open.
///
/// A failed send is logged and the next tick tries again; a missed
/// heartbeat never closes the channel by itself.
pub struct HeartbeatManager {
    interval: Duration,
    payload: String,
    connection: Weak<ConnectionManager>,
}

impl HeartbeatManager {
    pub fn new(connection: Weak<ConnectionManager>) -> Self {
        Self {
            interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            payload: TASK_KEEPALIVE.to_string(),
            connection,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Spawns the heartbeat task that runs periodically
    pub fn spawn(self) -> ScheduledTask {
        ScheduledTask::spawn(async move {
            let mut interval_timer =
                time::interval_at(time::Instant::now() + self.interval, self.interval);
            interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                interval_timer.tick().await;

                // Owner dropped, exit heartbeat task
                let Some(connection) = self.connection.upgrade() else {
                    break;
                };

                if !connection.is_connected() {
                    continue;
                }

                match connection.send_text(&self.payload).await {
                    Ok(_) => tracing::debug!("Sent heartbeat"),
                    Err(e) => tracing::warn!("[Heartbeat] Failed to send: {}", e),
                }
            }
        })
    }
}
