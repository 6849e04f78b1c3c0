use crate::messaging::MessageKind;
use crate::types::{Result, SessionError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire shape shared by every push channel: `{ type, data?, ...fields }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            fields: Map::new(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Top-level field other than `type` and `data`
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Deserializes the payload: `data` when present, the top-level fields otherwise
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.data {
            Some(data) => data.clone(),
            None => Value::Object(self.fields.clone()),
        };
        serde_json::from_value(value)
            .map_err(|e| SessionError::MalformedMessage(format!("{} payload: {}", self.kind, e)))
    }
}

/// Inbound push message, one variant per known kind
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    Connected(Envelope),
    Progress(Envelope),
    Completed(Envelope),
    Error(Envelope),
    Pong,
    StatsUpdate(Envelope),
    DocumentUploaded(Envelope),
    NewQuery(Envelope),
    NewMessage(Envelope),
    Unknown(Envelope),
}

impl PushMessage {
    /// Parses a text frame. Non-JSON payloads and payloads without a string
    /// `type` are rejected as malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| SessionError::MalformedMessage(format!("{} - raw: {}", e, text)))?;
        Ok(Self::from_envelope(envelope))
    }

    pub fn from_envelope(envelope: Envelope) -> Self {
        match MessageKind::parse(&envelope.kind) {
            MessageKind::Connected => Self::Connected(envelope),
            MessageKind::Progress => Self::Progress(envelope),
            MessageKind::Completed => Self::Completed(envelope),
            MessageKind::Error => Self::Error(envelope),
            MessageKind::Pong => Self::Pong,
            MessageKind::StatsUpdate => Self::StatsUpdate(envelope),
            MessageKind::DocumentUploaded => Self::DocumentUploaded(envelope),
            MessageKind::NewQuery => Self::NewQuery(envelope),
            MessageKind::NewMessage => Self::NewMessage(envelope),
            MessageKind::Unknown(_) => Self::Unknown(envelope),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Connected(_) => MessageKind::Connected,
            Self::Progress(_) => MessageKind::Progress,
            Self::Completed(_) => MessageKind::Completed,
            Self::Error(_) => MessageKind::Error,
            Self::Pong => MessageKind::Pong,
            Self::StatsUpdate(_) => MessageKind::StatsUpdate,
            Self::DocumentUploaded(_) => MessageKind::DocumentUploaded,
            Self::NewQuery(_) => MessageKind::NewQuery,
            Self::NewMessage(_) => MessageKind::NewMessage,
            Self::Unknown(envelope) => MessageKind::Unknown(envelope.kind.clone()),
        }
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Pong => None,
            Self::Connected(e)
            | Self::Progress(e)
            | Self::Completed(e)
            | Self::Error(e)
            | Self::StatsUpdate(e)
            | Self::DocumentUploaded(e)
            | Self::NewQuery(e)
            | Self::NewMessage(e)
            | Self::Unknown(e) => Some(e),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Error(_))
    }
}
