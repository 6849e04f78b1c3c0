use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur in the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The server answered with a non-2xx status
    #[error("HTTP error {status}")]
    Http { status: u16, body: Value },

    /// No response was received (connection refused, reset, DNS failure...)
    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be built (bad URL, bad header value...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials expired and could not be refreshed; the session was torn down
    #[error("Authentication expired")]
    AuthExpired,

    /// No access token is available for an operation that needs one
    #[error("Missing credential")]
    MissingCredential,

    /// Push payload could not be parsed
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Push channel closed without a terminal message
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Operation timed out
    #[error("Timeout error")]
    Timeout,

    /// Attempted operation while the channel is not open
    #[error("Not connected")]
    NotConnected,
}

impl SessionError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for showing to the user.
    ///
    /// The response `detail` wins when present; validation errors (arrays of
    /// `{loc, msg}`) are flattened one per line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { status, body } => {
                if let Some(detail) = body.get("detail")
                    && let Some(text) = detail_text(detail)
                {
                    return text;
                }
                if let Some(message) = body.get("message").and_then(Value::as_str) {
                    return message.to_string();
                }
                match status {
                    403 => "Permission denied".to_string(),
                    404 => "The requested resource does not exist".to_string(),
                    422 => "Invalid request parameters".to_string(),
                    500 => "Internal server error, please try again later".to_string(),
                    _ => "Request failed".to_string(),
                }
            }
            Self::Network(_) | Self::Timeout => {
                "Network error, please check your connection".to_string()
            }
            Self::Config(_) | Self::UrlParse(_) => "Request configuration error".to_string(),
            Self::AuthExpired => "Your session has expired, please sign in again".to_string(),
            Self::MissingCredential => "Please sign in first".to_string(),
            other => other.to_string(),
        }
    }
}

fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) if !items.is_empty() => Some(
            items
                .iter()
                .map(field_error_text)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

fn field_error_text(item: &Value) -> String {
    let location = item
        .get("loc")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|part| match part {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    let msg = item.get("msg").and_then(Value::as_str).unwrap_or_default();

    match (location.is_empty(), msg.is_empty()) {
        (false, false) => format!("{} {}", location, msg),
        (true, false) => msg.to_string(),
        (false, true) => location,
        (true, true) => item.to_string(),
    }
}

/// Convenience type alias for `Result<T, SessionError>`.
pub type Result<T> = std::result::Result<T, SessionError>;
