use crate::connection::{ConnectionCallbacks, TaskFault};
use crate::types::PushMessage;

/// Routes parsed push messages to a channel's registered handlers
pub struct MessageRouter {
    key: String,
    callbacks: ConnectionCallbacks,
}

impl MessageRouter {
    pub fn new(key: impl Into<String>, callbacks: ConnectionCallbacks) -> Self {
        Self {
            key: key.into(),
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &ConnectionCallbacks {
        &self.callbacks
    }

    /// Dispatches one message: the typed handler first, then `on_message`
    pub fn route(&self, message: &PushMessage) {
        match message {
            PushMessage::Progress(envelope) => self.callbacks.progress(envelope),
            PushMessage::Completed(envelope) => {
                tracing::info!("[{}] Task completed", self.key);
                self.callbacks.complete(envelope);
            }
            PushMessage::Error(envelope) => {
                tracing::warn!(
                    "[{}] Task reported an error: {}",
                    self.key,
                    envelope
                        .field("message")
                        .or(envelope.field("error"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("<no message>")
                );
                self.callbacks.error(&TaskFault::Reported(envelope.clone()));
            }
            PushMessage::Pong => {
                tracing::debug!("[{}] Received pong", self.key);
            }
            PushMessage::Connected(envelope) => {
                tracing::debug!("[{}] Server acknowledged channel", self.key);
                self.callbacks.acknowledged(envelope);
            }
            PushMessage::Unknown(envelope) => {
                tracing::warn!("[{}] Unknown message type '{}'", self.key, envelope.kind);
            }
            PushMessage::StatsUpdate(_)
            | PushMessage::DocumentUploaded(_)
            | PushMessage::NewQuery(_)
            | PushMessage::NewMessage(_) => {}
        }

        self.callbacks.message(message);
    }
}
