/// REST endpoint paths
pub mod endpoints {
    pub const LOGIN: &str = "/api/auth/login";
    pub const REGISTER: &str = "/api/auth/register";
    pub const REFRESH: &str = "/api/auth/refresh";
    pub const LOGOUT: &str = "/api/auth/logout";
    pub const CURRENT_USER: &str = "/api/auth/me";
    pub const CHANGE_PASSWORD: &str = "/api/auth/change-password";
    pub const DASHBOARD_STATS: &str = "/api/dashboard/stats";
    pub const HEALTH: &str = "/health";
}

/// Push channel URL parts
pub mod channels {
    pub const TOKEN_PARAM: &str = "token";
}

/// Inbound push message types (magic strings layer)
pub mod message_types {
    pub const CONNECTED: &str = "connected";
    pub const CONNECTION_ESTABLISHED: &str = "connection_established";
    pub const PROGRESS: &str = "progress";
    pub const COMPLETED: &str = "completed";
    pub const COMPLETE: &str = "complete";
    pub const ERROR: &str = "error";
    pub const PONG: &str = "pong";
    pub const STATS_UPDATE: &str = "stats_update";
    pub const DOCUMENT_UPLOADED: &str = "document_uploaded";
    pub const NEW_QUERY: &str = "new_query";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const GET_STATS: &str = "get_stats";
}

/// Persisted state keys
pub mod storage_keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USER_INFO: &str = "user_info";
    pub const USER_PERMISSIONS: &str = "user_permissions";
    pub const APP_START_TIME: &str = "app_start_time";

    /// Everything cleared when the session is invalidated
    pub const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, USER_INFO, USER_PERMISSIONS];
}

/// Default API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8800";

/// Unauthenticated entry route
pub const LOGIN_ROUTE: &str = "/login";

/// Default request timeout (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 10_000;

/// Default heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 30_000;

/// Delay between a terminal task message and the channel close (milliseconds)
pub const TERMINAL_CLOSE_GRACE: u64 = 1_000;

/// Bound on a single socket write or close handshake (milliseconds)
pub const WRITE_TIMEOUT: u64 = 1_000;

/// Keep-alive payload understood by per-task channels
pub const TASK_KEEPALIVE: &str = "ping";

/// Keep-alive payload understood by the dashboard channel
pub const DASHBOARD_KEEPALIVE: &str = r#"{"type":"ping"}"#;

/// Dashboard polling fallback interval (milliseconds)
pub const DASHBOARD_POLL_INTERVAL: u64 = 30_000;

/// Dashboard reconnect delay (milliseconds)
pub const DASHBOARD_RECONNECT_DELAY: u64 = 5_000;

/// Max entries kept in the recent documents list
pub const RECENT_DOCUMENTS_LIMIT: usize = 5;

/// Chars kept in an active session message preview
pub const MESSAGE_PREVIEW_CHARS: usize = 50;

/// Health probe interval (milliseconds)
pub const PROBE_INTERVAL: u64 = 30_000;

/// Health probe timeout (milliseconds)
pub const PROBE_TIMEOUT: u64 = 5_000;

/// Latency above which a probe is reported as delayed (milliseconds)
pub const WARNING_LATENCY: u64 = 1_000;

/// Latency above which a probe is reported as timed out (milliseconds)
pub const ERROR_LATENCY: u64 = 5_000;

/// Status samples retained
pub const STATUS_HISTORY_CAPACITY: usize = 10;

/// Samples averaged for the displayed latency
pub const LATENCY_SMOOTHING_WINDOW: usize = 5;
