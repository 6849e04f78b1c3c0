use crate::connection::ConnectionOptions;
use crate::dashboard::FeedOptions;
use crate::infrastructure::http_to_ws_endpoint;
use crate::types::constants::{
    DASHBOARD_POLL_INTERVAL, DASHBOARD_RECONNECT_DELAY, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT,
    HEARTBEAT_INTERVAL, LOGIN_ROUTE, PROBE_INTERVAL, PROBE_TIMEOUT, TERMINAL_CLOSE_GRACE,
};
use crate::types::{Result, SessionError};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Prefix shared by every environment variable read in `from_env`
pub const ENV_PREFIX: &str = "RAGCONSOLE_";

/// Settings for one console session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub api_url: String,
    /// Derived from `api_url` when unset
    pub ws_url: Option<String>,
    pub request_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub close_grace: Duration,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub login_route: String,
    /// Where credentials and the start time persist; in memory when unset
    pub state_file: Option<PathBuf>,
    /// Attach the access token to the dashboard channel URL
    pub dashboard_token: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            close_grace: Duration::from_millis(TERMINAL_CLOSE_GRACE),
            poll_interval: Duration::from_millis(DASHBOARD_POLL_INTERVAL),
            reconnect_delay: Duration::from_millis(DASHBOARD_RECONNECT_DELAY),
            probe_interval: Duration::from_millis(PROBE_INTERVAL),
            probe_timeout: Duration::from_millis(PROBE_TIMEOUT),
            login_route: LOGIN_ROUTE.to_string(),
            state_file: None,
            dashboard_token: false,
        }
    }
}

impl SessionConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `RAGCONSOLE_*` variables from the process
    /// environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let millis = |suffix: &str, default: Duration| -> Result<Duration> {
            match var(suffix) {
                Some(raw) => raw.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                    SessionError::Config(format!(
                        "{}{} must be a number of milliseconds, got '{}'",
                        ENV_PREFIX, suffix, raw
                    ))
                }),
                None => Ok(default),
            }
        };

        let defaults = Self::default();
        let config = Self {
            api_url: var("API_URL").unwrap_or(defaults.api_url),
            ws_url: var("WS_URL"),
            request_timeout: millis("REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            heartbeat_interval: millis("HEARTBEAT_INTERVAL_MS", defaults.heartbeat_interval)?,
            close_grace: millis("CLOSE_GRACE_MS", defaults.close_grace)?,
            poll_interval: millis("POLL_INTERVAL_MS", defaults.poll_interval)?,
            reconnect_delay: millis("RECONNECT_DELAY_MS", defaults.reconnect_delay)?,
            probe_interval: millis("PROBE_INTERVAL_MS", defaults.probe_interval)?,
            probe_timeout: millis("PROBE_TIMEOUT_MS", defaults.probe_timeout)?,
            login_route: var("LOGIN_ROUTE").unwrap_or(defaults.login_route),
            state_file: var("STATE_FILE").map(PathBuf::from),
            dashboard_token: match var("DASHBOARD_TOKEN") {
                Some(raw) => parse_flag(&raw).ok_or_else(|| {
                    SessionError::Config(format!(
                        "{}DASHBOARD_TOKEN must be true or false, got '{}'",
                        ENV_PREFIX, raw
                    ))
                })?,
                None => defaults.dashboard_token,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks URLs and that no interval is zero
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url)
            .map_err(|e| SessionError::Config(format!("invalid API URL '{}': {}", self.api_url, e)))?;
        if let Some(ws_url) = &self.ws_url {
            Url::parse(ws_url)
                .map_err(|e| SessionError::Config(format!("invalid WebSocket URL '{}': {}", ws_url, e)))?;
        }

        let intervals = [
            ("heartbeat interval", self.heartbeat_interval),
            ("poll interval", self.poll_interval),
            ("probe interval", self.probe_interval),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| value.is_zero()) {
            return Err(SessionError::Config(format!("{} must be positive", name)));
        }
        Ok(())
    }

    /// Base URL for push channels
    pub fn ws_base(&self) -> String {
        match &self.ws_url {
            Some(ws_url) => ws_url.trim_end_matches('/').to_string(),
            None => http_to_ws_endpoint(&self.api_url),
        }
    }

    /// Options for per-task channels
    pub fn task_options(&self) -> ConnectionOptions {
        ConnectionOptions::default()
            .with_heartbeat_interval(self.heartbeat_interval)
            .with_close_grace(self.close_grace)
    }

    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            poll_interval: self.poll_interval,
            reconnect_delay: self.reconnect_delay,
            connection: ConnectionOptions::dashboard().with_heartbeat_interval(self.heartbeat_interval),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
