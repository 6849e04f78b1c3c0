use crate::auth::KeyValueStore;
use crate::types::constants::storage_keys;
use chrono::{DateTime, Utc};

/// Wall-clock start of the application, shared across restarts through the
/// persisted `app_start_time` key (milliseconds since the epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeClock {
    started_at: DateTime<Utc>,
}

impl UptimeClock {
    /// Reads the recorded start, or records now when there is none
    pub fn restore(store: &dyn KeyValueStore) -> Self {
        let recorded = store
            .get(storage_keys::APP_START_TIME)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis);

        match recorded {
            Some(started_at) => Self { started_at },
            None => {
                let started_at = Utc::now();
                store.set(
                    storage_keys::APP_START_TIME,
                    &started_at.timestamp_millis().to_string(),
                );
                tracing::debug!("Recorded application start at {}", started_at);
                Self { started_at }
            }
        }
    }

    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since start; never negative
    pub fn elapsed_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}

/// `1d 2h 3m 4s`, leading zero units dropped
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;
    use chrono::Duration;

    #[test]
    fn test_restore_records_start_once() {
        let store = MemoryStore::new();
        let first = UptimeClock::restore(&store);
        let recorded = store.get(storage_keys::APP_START_TIME).unwrap();

        let second = UptimeClock::restore(&store);

        assert_eq!(recorded, first.started_at().timestamp_millis().to_string());
        assert_eq!(second.started_at(), first.started_at());
    }

    #[test]
    fn test_restore_survives_garbage() {
        let store = MemoryStore::new();
        store.set(storage_keys::APP_START_TIME, "yesterday");

        let clock = UptimeClock::restore(&store);

        assert!(clock.elapsed_secs() < 5);
        assert_ne!(store.get(storage_keys::APP_START_TIME).unwrap(), "yesterday");
    }

    #[test]
    fn test_elapsed_from_earlier_start() {
        let clock = UptimeClock::starting_at(Utc::now() - Duration::seconds(90));
        assert!((90..95).contains(&clock.elapsed_secs()));

        let future = UptimeClock::starting_at(Utc::now() + Duration::seconds(60));
        assert_eq!(future.elapsed_secs(), 0);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(59), "59s");
        assert_eq!(format_uptime(61), "1m 1s");
        assert_eq!(format_uptime(3_600), "1h 0m 0s");
        assert_eq!(format_uptime(90_061), "1d 1h 1m 1s");
    }
}
