use crate::types::constants::message_types;

/// Type-safe push message kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Server acknowledged the channel
    Connected,

    /// Task progress tick
    Progress,

    /// Task finished (terminal)
    Completed,

    /// Task failed (terminal)
    Error,

    /// Keep-alive reply
    Pong,

    /// Partial dashboard metrics
    StatsUpdate,

    /// A document was uploaded
    DocumentUploaded,

    /// A query was issued
    NewQuery,

    /// A chat message was posted to a session
    NewMessage,

    /// Anything else the server sends
    Unknown(String),
}

impl MessageKind {
    /// Parse a `type` discriminator into a MessageKind
    pub fn parse(s: &str) -> Self {
        match s {
            message_types::CONNECTED | message_types::CONNECTION_ESTABLISHED => Self::Connected,
            message_types::PROGRESS => Self::Progress,
            message_types::COMPLETED | message_types::COMPLETE => Self::Completed,
            message_types::ERROR => Self::Error,
            message_types::PONG => Self::Pong,
            message_types::STATS_UPDATE => Self::StatsUpdate,
            message_types::DOCUMENT_UPLOADED => Self::DocumentUploaded,
            message_types::NEW_QUERY => Self::NewQuery,
            message_types::NEW_MESSAGE => Self::NewMessage,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Convert kind to its canonical string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => message_types::CONNECTED,
            Self::Progress => message_types::PROGRESS,
            Self::Completed => message_types::COMPLETED,
            Self::Error => message_types::ERROR,
            Self::Pong => message_types::PONG,
            Self::StatsUpdate => message_types::STATS_UPDATE,
            Self::DocumentUploaded => message_types::DOCUMENT_UPLOADED,
            Self::NewQuery => message_types::NEW_QUERY,
            Self::NewMessage => message_types::NEW_MESSAGE,
            Self::Unknown(s) => s,
        }
    }

    /// Whether receiving this kind ends the channel's useful life
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
