use crate::types::constants::{LATENCY_SMOOTHING_WINDOW, STATUS_HISTORY_CAPACITY};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// API health as shown in the status bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No probe has finished yet
    #[default]
    Unknown,
    Normal,
    Warning,
    Error,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "API checking",
            HealthStatus::Normal => "API normal",
            HealthStatus::Warning => "API delayed",
            HealthStatus::Error => "API error",
        }
    }
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSample {
    pub status: HealthStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// Raw round trip of this probe
    pub latency_ms: u64,
}

/// Most recent samples, newest first
#[derive(Debug, Clone)]
pub struct StatusHistory {
    samples: VecDeque<StatusSample>,
    capacity: usize,
}

impl StatusHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: StatusSample) {
        self.samples.push_front(sample);
        self.samples.truncate(self.capacity);
    }

    /// Mean of the positive latencies among the newest samples, rounded.
    /// Falls back to `current` while there is nothing to average.
    pub fn smoothed_latency(&self, current: u64) -> u64 {
        let recent: Vec<u64> = self
            .samples
            .iter()
            .take(LATENCY_SMOOTHING_WINDOW)
            .map(|sample| sample.latency_ms)
            .filter(|latency| *latency > 0)
            .collect();

        if recent.is_empty() {
            return current;
        }
        let total: u64 = recent.iter().sum();
        (total as f64 / recent.len() as f64).round() as u64
    }

    pub fn latest(&self) -> Option<&StatusSample> {
        self.samples.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for StatusHistory {
    fn default() -> Self {
        Self::new(STATUS_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latency_ms: u64) -> StatusSample {
        StatusSample {
            status: HealthStatus::Normal,
            reason: "normal".into(),
            timestamp: Utc::now(),
            latency_ms,
        }
    }

    #[test]
    fn test_keeps_ten_newest_first() {
        let mut history = StatusHistory::default();
        for n in 1..=15 {
            history.push(sample(n));
        }

        let kept: Vec<u64> = history.iter().map(|s| s.latency_ms).collect();
        assert_eq!(kept, (6..=15).rev().collect::<Vec<_>>());
        assert_eq!(history.latest().map(|s| s.latency_ms), Some(15));
    }

    #[test]
    fn test_smoothing_uses_five_newest_positive() {
        let mut history = StatusHistory::default();
        assert_eq!(history.smoothed_latency(321), 321);

        for latency in [1000, 0, 100, 200, 0, 300] {
            history.push(sample(latency));
        }
        // Window is [300, 0, 200, 100, 0]
        assert_eq!(history.smoothed_latency(9999), 200);

        let mut zeros = StatusHistory::default();
        zeros.push(sample(0));
        assert_eq!(zeros.smoothed_latency(42), 42);
    }

    #[test]
    fn test_labels() {
        assert_eq!(HealthStatus::default().label(), "API checking");
        assert_eq!(HealthStatus::Warning.label(), "API delayed");
    }
}
