use super::history::{HealthStatus, StatusHistory, StatusSample};
use super::uptime::UptimeClock;
use crate::infrastructure::{ApiRequest, HttpTransport, ScheduledTask};
use crate::types::constants::{ERROR_LATENCY, PROBE_INTERVAL, PROBE_TIMEOUT, WARNING_LATENCY, endpoints};
use crate::types::{Result, SessionError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

/// One liveness check against the backend
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<()>;
}

/// `GET /health` straight through the transport.
///
/// Bypasses the request client on purpose: a failing probe must not raise
/// user notices or trigger a credential refresh.
pub struct HttpProbe {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            timeout: Duration::from_millis(PROBE_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl HealthCheck for HttpProbe {
    async fn check(&self) -> Result<()> {
        let request = ApiRequest::get(endpoints::HEALTH).with_timeout(self.timeout);
        let response = self.transport.execute(&request, None).await?;
        if !response.is_success() {
            return Err(SessionError::Http {
                status: response.status,
                body: response.body,
            });
        }
        Ok(())
    }
}

/// Maps a finished probe to a status and its short reason
pub fn classify(latency: Duration, outcome: &Result<()>) -> (HealthStatus, &'static str) {
    if outcome.is_err() {
        return (HealthStatus::Error, "exception");
    }
    let millis = latency.as_millis();
    if millis > u128::from(ERROR_LATENCY) {
        (HealthStatus::Error, "timeout")
    } else if millis > u128::from(WARNING_LATENCY) {
        (HealthStatus::Warning, "delayed")
    } else {
        (HealthStatus::Normal, "normal")
    }
}

/// What the status bar shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub status: HealthStatus,
    pub reason: String,
    /// Smoothed round trip
    pub latency_ms: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

/// Periodic health probing plus the uptime counter.
///
/// Probes once on start, then on every interval. Both timers stop on
/// `stop()` or when the prober is dropped.
#[derive(Clone)]
pub struct StatusProber {
    inner: Arc<ProberInner>,
}

struct ProberInner {
    check: Arc<dyn HealthCheck>,
    clock: UptimeClock,
    interval: Duration,
    timeout: Duration,
    history: Mutex<StatusHistory>,
    report: watch::Sender<StatusReport>,
    timers: Mutex<ProberTimers>,
}

#[derive(Default)]
struct ProberTimers {
    probe: Option<ScheduledTask>,
    uptime: Option<ScheduledTask>,
}

impl StatusProber {
    pub fn new(check: Arc<dyn HealthCheck>, clock: UptimeClock) -> Self {
        Self::with_timing(
            check,
            clock,
            Duration::from_millis(PROBE_INTERVAL),
            Duration::from_millis(PROBE_TIMEOUT),
        )
    }

    pub fn with_timing(
        check: Arc<dyn HealthCheck>,
        clock: UptimeClock,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        let (report, _) = watch::channel(StatusReport {
            uptime_secs: clock.elapsed_secs(),
            ..Default::default()
        });
        Self {
            inner: Arc::new(ProberInner {
                check,
                clock,
                interval,
                timeout,
                history: Mutex::new(StatusHistory::default()),
                report,
                timers: Mutex::new(ProberTimers::default()),
            }),
        }
    }

    /// Starts probing and the uptime tick. No-op when already running.
    pub fn start(&self) {
        let mut timers = self.inner.timers();
        if timers.probe.is_some() {
            return;
        }
        tracing::info!(
            "Starting status monitoring (every {:?})",
            self.inner.interval
        );

        let uptime = self.inner.clock.elapsed_secs();
        self.inner
            .report
            .send_modify(|report| report.uptime_secs = uptime);

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        timers.probe = Some(ScheduledTask::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.probe().await;
            }
        }));

        let weak = Arc::downgrade(&self.inner);
        timers.uptime = Some(ScheduledTask::every(Duration::from_secs(1), move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .report
                        .send_modify(|report| report.uptime_secs += 1);
                }
            }
        }));
    }

    /// Stops both timers. Idempotent.
    pub fn stop(&self) {
        let (probe, uptime) = {
            let mut timers = self.inner.timers();
            (timers.probe.take(), timers.uptime.take())
        };
        if probe.is_some() {
            tracing::info!("Status monitoring stopped");
        }
        for mut task in [probe, uptime].into_iter().flatten() {
            task.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .timers()
            .probe
            .as_ref()
            .is_some_and(ScheduledTask::is_active)
    }

    /// Runs one probe right away and returns the updated report
    pub async fn probe_now(&self) -> StatusReport {
        self.inner.probe().await
    }

    pub fn report(&self) -> StatusReport {
        self.inner.report.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.inner.report.subscribe()
    }

    /// Newest first
    pub fn history(&self) -> Vec<StatusSample> {
        self.inner.history().iter().cloned().collect()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.clock.started_at()
    }
}

impl ProberInner {
    fn timers(&self) -> MutexGuard<'_, ProberTimers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn history(&self) -> MutexGuard<'_, StatusHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn probe(&self) -> StatusReport {
        let started = Instant::now();
        let outcome = match time::timeout(self.timeout, self.check.check()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SessionError::Timeout),
        };
        let latency = started.elapsed();

        let (status, reason) = classify(latency, &outcome);
        if let Err(e) = &outcome {
            tracing::warn!("Health check failed: {}", e);
        }

        let raw = latency.as_millis() as u64;
        let now = Utc::now();
        let displayed = {
            let mut history = self.history();
            let displayed = history.smoothed_latency(raw);
            history.push(StatusSample {
                status,
                reason: reason.to_string(),
                timestamp: now,
                latency_ms: raw,
            });
            displayed
        };
        tracing::debug!("Health: {:?} ({}), {}ms", status, reason, displayed);

        self.report.send_modify(|report| {
            report.status = status;
            report.reason = reason.to_string();
            report.latency_ms = displayed;
            report.last_update = Some(now);
        });
        self.report.borrow().clone()
    }
}
