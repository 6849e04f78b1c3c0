use crate::types::constants::{MESSAGE_PREVIEW_CHARS, RECENT_DOCUMENTS_LIMIT};
use crate::types::{PushMessage, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label shown on a session that just received a message
pub const JUST_NOW: &str = "just now";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStats {
    pub total: u64,
    pub recent_7days: u64,
    pub trend_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStats {
    pub total: u64,
    pub active_7days: u64,
    pub trend_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStats {
    pub total: u64,
    pub recent_7days: u64,
    pub trend_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub total: u64,
    pub active: u64,
}

/// One day of the activity chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityPoint {
    pub date: String,
    pub date_label: String,
    pub weekday: String,
    pub documents: u64,
    pub queries: u64,
    pub messages: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentDocument {
    pub id: Value,
    pub filename: String,
    pub file_type: String,
    pub created_at: Option<String>,
    pub relative_time: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveSession {
    pub session_id: String,
    pub title: String,
    pub message_count: u64,
    pub last_message: String,
    pub updated_at: Option<String>,
    pub relative_time: String,
}

/// `stats_update` payload; absent sections are left alone
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatsUpdate {
    pub documents: Option<DocumentStats>,
    pub sessions: Option<SessionStats>,
    pub queries: Option<QueryStats>,
    pub users: Option<UserStats>,
}

/// `new_message` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMessage {
    pub session_id: String,
    #[serde(default)]
    pub content: String,
}

/// Everything the dashboard shows.
///
/// Replaced wholesale by a full fetch, patched in place by push messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSnapshot {
    pub documents: DocumentStats,
    pub sessions: SessionStats,
    pub queries: QueryStats,
    pub users: UserStats,
    pub activity_timeline: Vec<ActivityPoint>,
    pub recent_documents: Vec<RecentDocument>,
    pub active_sessions: Vec<ActiveSession>,
    #[serde(skip)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl DashboardSnapshot {
    /// Installs a freshly fetched snapshot
    pub fn replace(&mut self, fresh: DashboardSnapshot) {
        *self = fresh;
        self.recent_documents.truncate(RECENT_DOCUMENTS_LIMIT);
        self.last_updated = Some(Utc::now());
    }

    pub fn apply_stats_update(&mut self, update: StatsUpdate) {
        if let Some(documents) = update.documents {
            self.documents = documents;
        }
        if let Some(sessions) = update.sessions {
            self.sessions = sessions;
        }
        if let Some(queries) = update.queries {
            self.queries = queries;
        }
        if let Some(users) = update.users {
            self.users = users;
        }
    }

    /// Newest first, capped at `RECENT_DOCUMENTS_LIMIT`
    pub fn record_document_uploaded(&mut self, document: RecentDocument) {
        self.documents.total += 1;
        self.documents.recent_7days += 1;
        self.recent_documents.insert(0, document);
        self.recent_documents.truncate(RECENT_DOCUMENTS_LIMIT);
    }

    pub fn record_new_query(&mut self) {
        self.queries.total += 1;
        self.queries.recent_7days += 1;
    }

    /// Returns false when the session is not on the dashboard; no session
    /// is created for it.
    pub fn record_new_message(&mut self, message: &NewMessage) -> bool {
        let Some(session) = self
            .active_sessions
            .iter_mut()
            .find(|s| s.session_id == message.session_id)
        else {
            return false;
        };

        session.message_count += 1;
        session.last_message = preview(&message.content);
        session.relative_time = JUST_NOW.to_string();
        true
    }

    /// Applies one push message. `Ok(false)` means the message does not
    /// concern the snapshot.
    pub fn apply(&mut self, message: &PushMessage) -> Result<bool> {
        match message {
            PushMessage::StatsUpdate(envelope) => {
                self.apply_stats_update(envelope.data_as()?);
                Ok(true)
            }
            PushMessage::DocumentUploaded(envelope) => {
                self.record_document_uploaded(envelope.data_as()?);
                Ok(true)
            }
            PushMessage::NewQuery(_) => {
                self.record_new_query();
                Ok(true)
            }
            PushMessage::NewMessage(envelope) => Ok(self.record_new_message(&envelope.data_as()?)),
            _ => Ok(false),
        }
    }

    /// Whether any headline counter is non-zero
    pub fn has_data(&self) -> bool {
        self.documents.total > 0 || self.sessions.total > 0 || self.queries.total > 0
    }
}

fn preview(content: &str) -> String {
    let mut preview: String = content.chars().take(MESSAGE_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}
